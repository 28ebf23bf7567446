//! Timeline layout.
//!
//! - **`interval`**: time-scale granularity and detail-view auto scaling.
//! - **`aesthetics`**: marker and card styles.
//! - **`layout`**: the layout engine and the [`Scene`] it produces.
//! - **`animation`**: frames advancing open executions between recomputes.

pub mod aesthetics;
pub mod animation;
pub mod interval;
pub mod layout;

pub use aesthetics::{MarkerKind, MarkerStyle};
pub use animation::{AnimationClock, AnimationFrame};
pub use interval::{IntervalError, TimeInterval, MAX_INTERVAL_MS};
pub use layout::{
    AxisLine, Bar, GridLine, GridLineKind, JobCard, JobLabel, LaneGeometry, LayoutParams, NowMarker, Point,
    Scene, TimelineLayoutEngine, ViewMode, Window, DEFAULT_INTERVAL_PX, DEFAULT_MIN_INTERVALS, DEFAULT_WIDTH,
    DETAIL_MIN_INTERVALS, MAX_WIDTH,
};
