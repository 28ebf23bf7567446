//! Colors and marker sizes of timeline elements.

use serde::Serialize;

use crate::model::EventKind;

/// Fill and border of a marker or bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerStyle {
    pub fill: &'static str,
    pub size: u32,
    pub border_color: &'static str,
    pub border_size: u32,
}

/// Every kind of mark a scene can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Submitted,
    Executed,
    Error,
    Running,
    Missed,
    Added,
    Modified,
    Removed,
    MaxInstances,
    Scheduled,
}

impl MarkerKind {
    pub const fn style(&self) -> MarkerStyle {
        match self {
            Self::Submitted => style("#597EFF", 11, "#2B3046", 2),
            Self::Executed => style("#3EBF91", 11, "#2B3046", 2),
            Self::Error => style("#FF6464", 11, "#2B3046", 2),
            Self::Running => style("#597EFF", 11, "rgba(89, 126, 255, 0.7)", 2),
            Self::Missed => style("#2B2F46", 11, "#FF6464", 2),
            Self::Added => style("#2B3046", 6, "#3EBF91", 1),
            Self::Modified => style("#2B3046", 6, "#597EFF", 1),
            Self::Removed => style("#2B3046", 6, "#FF6464", 1),
            Self::MaxInstances => style("#FF6464", 10, "#2B3046", 3),
            Self::Scheduled => style("#2B3046", 11, "#969FCC", 2),
        }
    }

    /// Marker used for an event of `kind`, if that kind is ever drawn.
    pub const fn for_event(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::JobAdded => Some(Self::Added),
            EventKind::JobModified => Some(Self::Modified),
            EventKind::JobRemoved => Some(Self::Removed),
            EventKind::JobSubmitted => Some(Self::Submitted),
            EventKind::JobExecuted => Some(Self::Executed),
            EventKind::JobError => Some(Self::Error),
            EventKind::JobMissed => Some(Self::Missed),
            EventKind::JobMaxInstances => Some(Self::MaxInstances),
            _ => None,
        }
    }
}

const fn style(fill: &'static str, size: u32, border_color: &'static str, border_size: u32) -> MarkerStyle {
    MarkerStyle {
        fill,
        size,
        border_color,
        border_size,
    }
}

/// Plot-wide grid colors.
pub mod plot {
    pub const GRID_COLOR: &str = "#474966";
    pub const GRID_WIDTH: u32 = 1;
    pub const MINOR_BREAKS_COLOR: &str = "#2B2C3D";
}

/// Per-job card colors.
pub mod card {
    pub const BACKGROUND: &str = "#2F344D";
    pub const OPACITY: f64 = 0.8;
    pub const AXIS_COLOR: &str = "#373C54";
    pub const AXIS_WIDTH: u32 = 1;
}

/// Size of the "now" marker triangles.
pub const NOW_MARKER_SIZE: u32 = 8;
