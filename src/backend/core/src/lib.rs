#![allow(clippy::result_large_err)]
//! # Jobscope Core
//!
//! Live timeline dashboard for background job schedulers.
//!
//! ## Architecture
//!
//! - **Model**: event-sourced scheduler and job aggregates built from a
//!   snapshot plus a stream of scheduler events
//! - **Timeline**: a pure layout engine that turns the model into a scene of
//!   bars, markers, cards and grid lines, plus per-pixel animation frames
//! - **Ingest**: stream framing, event sources and the single-writer ingestor
//! - **View**: the server-side live view with its redraw and debounce timers
//! - **API**: a read-only HTTP API and a WebSocket feed of live frames
//! - **Telemetry**: structured logging and Prometheus metrics

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod telemetry;
pub mod timeline;
pub mod view;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, JobscopeError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, JobscopeError, Result};
    pub use crate::ingest::{ChannelSource, EventSource, Ingestor, JsonLinesSource, ModelStore, StreamMessage};
    pub use crate::model::{
        Aggregate, ApplyOutcome, EventKind, Execution, IgnoreReason, JobAggregate, RawEvent, ReplaySummary,
        SchedulerAggregate, SchedulerEvent, Snapshot, Timestamp,
    };
    pub use crate::timeline::{
        AnimationClock, AnimationFrame, LaneGeometry, LayoutParams, Scene, TimeInterval, TimelineLayoutEngine,
        ViewMode,
    };
    pub use crate::view::{LiveFrame, LiveView, LiveViewClient, LiveViewHandle, ViewCommand};
}
