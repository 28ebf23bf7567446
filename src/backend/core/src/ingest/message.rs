//! Transport framing of the scheduler stream.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, JobscopeError, Result};
use crate::model::{RawEvent, Snapshot};

/// One message on the scheduler stream.
///
/// Encoded as `{"type": "...", "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Full snapshot; starts (or restarts) a session.
    InitJobs(Snapshot),
    SchedulerEvent(RawEvent),
    JobEvent(RawEvent),
    ExecutorEvent(RawEvent),
    JobstoreEvent(RawEvent),
}

impl StreamMessage {
    /// Decode a single JSON frame.
    pub fn decode(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|err| {
            JobscopeError::with_internal(
                ErrorCode::StreamDecodeError,
                "Failed to decode stream message",
                err.to_string(),
            )
            .with_source(err)
        })
    }

    /// Message type as it appears on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InitJobs(_) => "init_jobs",
            Self::SchedulerEvent(_) => "scheduler_event",
            Self::JobEvent(_) => "job_event",
            Self::ExecutorEvent(_) => "executor_event",
            Self::JobstoreEvent(_) => "jobstore_event",
        }
    }

    /// The carried event, for every message except the snapshot.
    pub fn event(&self) -> Option<&RawEvent> {
        match self {
            Self::InitJobs(_) => None,
            Self::SchedulerEvent(event)
            | Self::JobEvent(event)
            | Self::ExecutorEvent(event)
            | Self::JobstoreEvent(event) => Some(event),
        }
    }
}
