//! Event-sourced scheduler model.
//!
//! - **`event`**: wire events, event kinds and timestamp normalization.
//! - **`snapshot`**: the session snapshot schema.
//! - **`job`**: the per-job aggregate with its executions.
//! - **`scheduler`**: the scheduler aggregate that routes events to jobs.

pub mod event;
pub mod job;
pub mod scheduler;
pub mod snapshot;

pub use event::*;
pub use job::*;
pub use scheduler::*;
pub use snapshot::*;

use serde::Serialize;

// =============================================================================
// Aggregate Trait
// =============================================================================

/// State that is reconstructed by folding events in arrival order.
///
/// Applying an event never fails. Events the aggregate cannot place are
/// reported through [`ApplyOutcome::Ignored`] and leave the state unchanged.
pub trait Aggregate {
    type Event;

    /// Fold a single event into the aggregate.
    fn apply(&mut self, event: &Self::Event) -> ApplyOutcome;

    /// Number of events applied so far.
    fn version(&self) -> u64;

    /// Fold a sequence of events, returning what happened to them.
    fn replay<'a, I>(&mut self, events: I) -> ReplaySummary
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        let mut summary = ReplaySummary::default();
        for event in events {
            summary.record(&self.apply(event));
        }
        summary
    }
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The event changed model state.
    Applied { kind: EventKind },
    /// The event is known but carries nothing the model keeps.
    Acknowledged { kind: EventKind },
    /// The event was dropped.
    Ignored { reason: IgnoreReason },
}

impl ApplyOutcome {
    pub fn ignored(reason: IgnoreReason) -> Self {
        Self::Ignored { reason }
    }

    /// Whether the event changed anything a view depends on.
    pub fn mutated(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Label used for the `outcome` metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Acknowledged { .. } => "acknowledged",
            Self::Ignored { reason } => reason.label(),
        }
    }
}

/// Why an event was dropped instead of applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IgnoreReason {
    UnknownKind { kind: String },
    MissingJobId { kind: EventKind },
    UnknownJob { kind: EventKind, job_id: String },
    MalformedTimestamp { field: String, value: String },
    /// No snapshot has started a session yet.
    NotInitialized { kind: String },
}

impl IgnoreReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnknownKind { .. } => "unknown_kind",
            Self::MissingJobId { .. } => "missing_job_id",
            Self::UnknownJob { .. } => "unknown_job",
            Self::MalformedTimestamp { .. } => "malformed_timestamp",
            Self::NotInitialized { .. } => "not_initialized",
        }
    }
}

impl From<NormalizeError> for IgnoreReason {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::UnknownKind(UnknownEventKind(kind)) => Self::UnknownKind { kind },
            NormalizeError::MalformedTimestamp { field, value } => Self::MalformedTimestamp {
                field: field.to_string(),
                value,
            },
        }
    }
}

/// Tally of a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub applied: usize,
    pub acknowledged: usize,
    pub ignored: usize,
}

impl ReplaySummary {
    pub fn record(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied { .. } => self.applied += 1,
            ApplyOutcome::Acknowledged { .. } => self.acknowledged += 1,
            ApplyOutcome::Ignored { .. } => self.ignored += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.applied + self.acknowledged + self.ignored
    }
}
