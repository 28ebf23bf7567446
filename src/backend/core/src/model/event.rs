//! Scheduler lifecycle events: wire form, kinds and normalization.
//!
//! Events arrive as [`RawEvent`]s with string timestamps. Before they touch the
//! model they are normalized into [`SchedulerEvent`]s, whose timestamps are
//! wall-clock instants in the scheduler's timezone. Normalization fails closed:
//! an event with an unknown kind or an unparseable timestamp is rejected as a
//! whole and never partially applied.

use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::job::JobDefinition;
use super::snapshot::JobProperties;

/// A wall-clock instant in the scheduler's timezone.
pub type Timestamp = NaiveDateTime;

/// Format used by the scheduler when it serializes timestamps.
pub const WIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a wire timestamp into scheduler-local wall time.
///
/// Naive strings are taken as already being in the scheduler's timezone.
/// Strings carrying an offset (RFC 3339) are converted into it.
pub fn parse_timestamp(value: &str, tz: &Tz) -> Option<Timestamp> {
    let value = value.trim();
    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(tz).naive_local())
}

/// Render a timestamp the way the scheduler does.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format(WIRE_FORMAT).to_string()
}

// =============================================================================
// Event Kinds
// =============================================================================

/// The known set of scheduler lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SchedulerStarted,
    SchedulerShutdown,
    SchedulerPaused,
    SchedulerResumed,
    ExecutorAdded,
    ExecutorRemoved,
    JobstoreAdded,
    JobstoreRemoved,
    JobAdded,
    AllJobsRemoved,
    JobModified,
    JobRemoved,
    JobSubmitted,
    JobExecuted,
    JobError,
    JobMissed,
    JobMaxInstances,
}

impl EventKind {
    pub const ALL: [EventKind; 17] = [
        Self::SchedulerStarted,
        Self::SchedulerShutdown,
        Self::SchedulerPaused,
        Self::SchedulerResumed,
        Self::ExecutorAdded,
        Self::ExecutorRemoved,
        Self::JobstoreAdded,
        Self::JobstoreRemoved,
        Self::JobAdded,
        Self::AllJobsRemoved,
        Self::JobModified,
        Self::JobRemoved,
        Self::JobSubmitted,
        Self::JobExecuted,
        Self::JobError,
        Self::JobMissed,
        Self::JobMaxInstances,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SchedulerStarted => "scheduler_started",
            Self::SchedulerShutdown => "scheduler_shutdown",
            Self::SchedulerPaused => "scheduler_paused",
            Self::SchedulerResumed => "scheduler_resumed",
            Self::ExecutorAdded => "executor_added",
            Self::ExecutorRemoved => "executor_removed",
            Self::JobstoreAdded => "jobstore_added",
            Self::JobstoreRemoved => "jobstore_removed",
            Self::JobAdded => "job_added",
            Self::AllJobsRemoved => "all_jobs_removed",
            Self::JobModified => "job_modified",
            Self::JobRemoved => "job_removed",
            Self::JobSubmitted => "job_submitted",
            Self::JobExecuted => "job_executed",
            Self::JobError => "job_error",
            Self::JobMissed => "job_missed",
            Self::JobMaxInstances => "job_max_instances",
        }
    }

    /// Kinds addressed at a single job through `job_id`.
    pub const fn is_job_scoped(&self) -> bool {
        matches!(
            self,
            Self::JobModified
                | Self::JobRemoved
                | Self::JobSubmitted
                | Self::JobExecuted
                | Self::JobError
                | Self::JobMissed
                | Self::JobMaxInstances
        )
    }

    /// Kinds that close (or fail to start) an execution.
    pub const fn is_closing(&self) -> bool {
        matches!(
            self,
            Self::JobExecuted | Self::JobError | Self::JobMissed | Self::JobMaxInstances
        )
    }

    /// Kinds that belong to an execution keyed by scheduled run time.
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::JobSubmitted) || self.is_closing()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an event kind string is not part of the known set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

// =============================================================================
// Wire Event
// =============================================================================

/// An event as it is delivered by the scheduler, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(alias = "event_name")]
    pub kind: String,

    #[serde(alias = "event_ts")]
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_run_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_times: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retval: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,

    /// Executor or jobstore alias for registry events.
    #[serde(default, alias = "executor_name", alias = "jobstore_name", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Job definition, carried by `job_added` and `job_modified`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<JobProperties>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_time: Option<String>,
}

impl RawEvent {
    pub fn new(kind: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: timestamp.into(),
            ..Default::default()
        }
    }

    pub fn for_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_scheduled_run_time(mut self, ts: impl Into<String>) -> Self {
        self.scheduled_run_time = Some(ts.into());
        self
    }

    pub fn with_next_run_times<I, S>(mut self, times: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next_run_times = Some(times.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_properties(mut self, properties: JobProperties) -> Self {
        self.properties = Some(properties);
        self
    }
}

// =============================================================================
// Normalized Event
// =============================================================================

/// Why a raw event could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    UnknownKind(#[from] UnknownEventKind),

    #[error("malformed timestamp in `{field}`: {value:?}")]
    MalformedTimestamp { field: &'static str, value: String },
}

/// A normalized scheduler event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerEvent {
    pub kind: EventKind,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_run_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_times: Option<Vec<Timestamp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retval: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Parsed job definition, carried by `job_added` and `job_modified`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<JobDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_time: Option<Timestamp>,
}

impl SchedulerEvent {
    /// A bare event of `kind` at `timestamp` with no payload.
    pub fn new(kind: EventKind, timestamp: Timestamp) -> Self {
        Self {
            kind,
            timestamp,
            job_id: None,
            scheduled_run_time: None,
            next_run_times: None,
            retval: None,
            exception: None,
            traceback: None,
            alias: None,
            definition: None,
            added_time: None,
        }
    }

    /// Normalize a wire event against the scheduler's timezone.
    pub fn normalize(raw: &RawEvent, tz: &Tz) -> Result<Self, NormalizeError> {
        let kind: EventKind = raw.kind.parse()?;
        let timestamp = parse_field("timestamp", &raw.timestamp, tz)?;

        let scheduled_run_time = raw
            .scheduled_run_time
            .as_deref()
            .map(|value| parse_field("scheduled_run_time", value, tz))
            .transpose()?;

        let next_run_times = raw
            .next_run_times
            .as_ref()
            .map(|times| {
                times
                    .iter()
                    .map(|value| parse_field("next_run_times", value, tz))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let added_time = raw
            .added_time
            .as_deref()
            .map(|value| parse_field("added_time", value, tz))
            .transpose()?;

        let definition = raw
            .properties
            .as_ref()
            .map(|properties| JobDefinition::from_properties(properties, tz))
            .transpose()?;

        Ok(Self {
            kind,
            timestamp,
            job_id: raw.job_id.clone(),
            scheduled_run_time,
            next_run_times,
            retval: raw.retval.clone(),
            exception: raw.exception.clone(),
            traceback: raw.traceback.clone(),
            alias: raw.alias.clone(),
            definition,
            added_time,
        })
    }

    /// The removal event synthesized for every job on `all_jobs_removed`.
    pub fn synthetic_removal(source: &SchedulerEvent, job_id: &str) -> Self {
        let mut event = Self::new(EventKind::JobRemoved, source.timestamp);
        event.job_id = Some(job_id.to_string());
        event
    }
}

fn parse_field(field: &'static str, value: &str, tz: &Tz) -> Result<Timestamp, NormalizeError> {
    parse_timestamp(value, tz).ok_or_else(|| NormalizeError::MalformedTimestamp {
        field,
        value: value.to_string(),
    })
}
