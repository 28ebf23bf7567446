//! Per-job aggregate reconstructed from a snapshot entry plus replayed events.

use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::event::{format_timestamp, parse_timestamp, EventKind, NormalizeError, SchedulerEvent, Timestamp};
use super::snapshot::{JobProperties, SnapshotJob};
use super::{Aggregate, ApplyOutcome};

// =============================================================================
// Job Definition
// =============================================================================

/// Job configuration as of its last known modification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobConfig {
    pub func: Option<String>,
    pub func_ref: Option<String>,
    pub args: Option<serde_json::Value>,
    pub kwargs: Option<serde_json::Value>,
    pub trigger: Option<String>,
    pub jobstore: Option<String>,
    pub executor: Option<String>,
    pub coalesce: Option<bool>,
    pub misfire_grace_time: Option<f64>,
    pub max_instances: Option<u32>,
}

/// Normalized form of [`JobProperties`]: the parts of a job definition the
/// aggregate consumes, with run times parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDefinition {
    pub id: String,
    pub name: Option<String>,
    pub pending: Option<bool>,
    pub config: JobConfig,
    pub next_run_times: Option<Vec<Timestamp>>,
}

impl JobDefinition {
    pub fn from_properties(properties: &JobProperties, tz: &Tz) -> Result<Self, NormalizeError> {
        let next_run_times = properties
            .next_run_time
            .as_ref()
            .map(|times| {
                times
                    .iter()
                    .map(|value| {
                        parse_timestamp(value, tz).ok_or_else(|| NormalizeError::MalformedTimestamp {
                            field: "properties.next_run_time",
                            value: value.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(Self {
            id: properties.id.clone(),
            name: properties.name.clone(),
            pending: properties.pending,
            config: JobConfig {
                func: properties.func.clone(),
                func_ref: properties.func_ref.clone(),
                args: properties.args.clone(),
                kwargs: properties.kwargs.clone(),
                trigger: properties.trigger.clone(),
                jobstore: properties.jobstore.clone(),
                executor: properties.executor.clone(),
                coalesce: properties.coalesce,
                misfire_grace_time: properties.misfire_grace_time,
                max_instances: properties.max_instances,
            },
            next_run_times,
        })
    }
}

// =============================================================================
// Stats, Lifecycle, Executions
// =============================================================================

/// Summary statistics maintained while events are folded in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStats {
    pub pending: bool,
    /// Kind of the event holding the `last_event_ts` high-water mark.
    pub current_status: Option<EventKind>,
    pub first_event_ts: Option<Timestamp>,
    pub last_event_ts: Option<Timestamp>,
    pub added_ts: Timestamp,
    pub modified_ts: Option<Timestamp>,
}

/// Whether a job is still registered with the scheduler.
///
/// Removal never deletes a job or its history; it only moves it to `Removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    Active,
    Removed { at: Timestamp },
}

/// One run attempt of a job, keyed by its scheduled run time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution {
    pub scheduled_run_time: Timestamp,
    pub start_ts: Timestamp,
    pub end_ts: Timestamp,
    pub status: EventKind,
    pub events: Vec<SchedulerEvent>,
}

impl Execution {
    fn opened_by(event: &SchedulerEvent, scheduled_run_time: Timestamp) -> Self {
        Self {
            scheduled_run_time,
            start_ts: event.timestamp,
            end_ts: event.timestamp,
            status: event.kind,
            events: Vec::new(),
        }
    }

    /// Still waiting for a closing event.
    pub fn is_open(&self) -> bool {
        self.status == EventKind::JobSubmitted
    }
}

// =============================================================================
// Job Aggregate
// =============================================================================

/// Reconstructed state of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobAggregate {
    pub id: String,
    pub name: String,
    pub config: JobConfig,
    pub stats: JobStats,
    pub lifecycle: Lifecycle,
    /// Events not tied to an execution, in arrival order.
    pub events: Vec<SchedulerEvent>,
    pub executions: BTreeMap<Timestamp, Execution>,
    pub next_run_times: Vec<Timestamp>,
    #[serde(skip)]
    last_event: Option<SchedulerEvent>,
    /// Number of events applied.
    pub version: u64,
}

impl JobAggregate {
    /// An empty job registered at `added_ts`.
    pub fn new(id: impl Into<String>, name: impl Into<String>, added_ts: Timestamp) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            config: JobConfig::default(),
            stats: JobStats {
                pending: false,
                current_status: None,
                first_event_ts: None,
                last_event_ts: None,
                added_ts,
                modified_ts: None,
            },
            lifecycle: Lifecycle::Active,
            events: Vec::new(),
            executions: BTreeMap::new(),
            next_run_times: Vec::new(),
            last_event: None,
            version: 0,
        }
    }

    /// Build a job from its snapshot entry. Embedded events are not replayed here.
    pub fn from_snapshot(entry: &SnapshotJob, tz: &Tz) -> Result<Self, NormalizeError> {
        let parse = |field: &'static str, value: &str| {
            parse_timestamp(value, tz).ok_or_else(|| NormalizeError::MalformedTimestamp {
                field,
                value: value.to_string(),
            })
        };

        let definition = JobDefinition::from_properties(&entry.properties, tz)?;
        let added_ts = parse("added_time", &entry.added_time)?;

        let mut job = Self::new(definition.id.clone(), definition.id.clone(), added_ts);
        job.apply_definition(&definition);

        if let Some(modified) = entry.modified_time.as_deref() {
            job.stats.modified_ts = Some(parse("modified_time", modified)?);
        }
        if let Some(removed) = entry.removed_time.as_deref() {
            job.lifecycle = Lifecycle::Removed {
                at: parse("removed_time", removed)?,
            };
        }

        Ok(job)
    }

    /// Build a job from a `job_added` event. The event itself still has to be
    /// applied afterwards so that stats and run times pick it up.
    pub fn from_added_event(job_id: &str, event: &SchedulerEvent) -> Self {
        let added_ts = event.added_time.unwrap_or(event.timestamp);
        let mut job = Self::new(job_id, job_id, added_ts);
        match &event.definition {
            Some(definition) => job.apply_definition(definition),
            None => debug!(job_id = %job_id, "job_added without properties, using id as name"),
        }
        job
    }

    /// Bring a removed job back after it was re-added under the same id.
    pub fn reactivate(&mut self, event: &SchedulerEvent) {
        self.lifecycle = Lifecycle::Active;
        if let Some(definition) = &event.definition {
            self.apply_definition(definition);
        }
    }

    fn apply_definition(&mut self, definition: &JobDefinition) {
        if let Some(name) = &definition.name {
            self.name = name.clone();
        }
        if let Some(pending) = definition.pending {
            self.stats.pending = pending;
        }
        self.config = definition.config.clone();
        if let Some(times) = &definition.next_run_times {
            self.next_run_times = times.clone();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event folding
    // ─────────────────────────────────────────────────────────────────────────

    /// Fold one event into the job.
    pub fn apply_event(&mut self, event: &SchedulerEvent) -> ApplyOutcome {
        self.version += 1;

        if event.kind == EventKind::JobModified {
            if let Some(definition) = &event.definition {
                self.apply_definition(definition);
            }
        }

        if self.stats.last_event_ts.map_or(true, |last| event.timestamp > last) {
            self.stats.last_event_ts = Some(event.timestamp);
            self.stats.current_status = Some(event.kind);
        }
        if self.stats.first_event_ts.map_or(true, |first| event.timestamp < first) {
            self.stats.first_event_ts = Some(event.timestamp);
        }

        if let Some(times) = &event.next_run_times {
            self.next_run_times = times.clone();
        }

        self.last_event = Some(event.clone());

        match event.kind {
            EventKind::JobModified => self.on_modified(event),
            EventKind::JobRemoved => self.on_removed(event),
            EventKind::JobSubmitted => self.on_submitted(event),
            EventKind::JobExecuted
            | EventKind::JobError
            | EventKind::JobMissed
            | EventKind::JobMaxInstances => self.on_closed(event),
            _ => {}
        }

        ApplyOutcome::Applied { kind: event.kind }
    }

    fn on_modified(&mut self, event: &SchedulerEvent) {
        self.stats.modified_ts = Some(event.timestamp);
        self.events.push(event.clone());
    }

    fn on_removed(&mut self, event: &SchedulerEvent) {
        self.lifecycle = Lifecycle::Removed { at: event.timestamp };
        self.events.push(event.clone());
    }

    fn on_submitted(&mut self, event: &SchedulerEvent) {
        let Some(execution) = self.execution_for(event) else {
            return;
        };
        execution.start_ts = event.timestamp;
        if execution.end_ts < execution.start_ts {
            execution.end_ts = execution.start_ts;
        }
        execution.events.push(event.clone());
    }

    fn on_closed(&mut self, event: &SchedulerEvent) {
        let Some(execution) = self.execution_for(event) else {
            return;
        };
        execution.end_ts = event.timestamp.max(execution.start_ts);
        execution.status = event.kind;
        execution.events.push(event.clone());
    }

    /// Locate or create the execution an event belongs to. Events without a
    /// scheduled run time are kept as bare events instead.
    fn execution_for(&mut self, event: &SchedulerEvent) -> Option<&mut Execution> {
        let Some(scheduled_run_time) = event.scheduled_run_time else {
            debug!(
                job_id = %self.id,
                kind = %event.kind,
                "execution event without scheduled_run_time recorded as bare event"
            );
            self.events.push(event.clone());
            return None;
        };

        Some(
            self.executions
                .entry(scheduled_run_time)
                .or_insert_with(|| Execution::opened_by(event, scheduled_run_time)),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Earliest instant this job has data for.
    pub fn min_ts(&self) -> Timestamp {
        match self.stats.first_event_ts {
            Some(first) => first.min(self.stats.added_ts),
            None => self.stats.added_ts,
        }
    }

    /// Latest instant this job has data for, including upcoming runs.
    pub fn max_ts(&self) -> Timestamp {
        let next = self.next_run_times.iter().max().copied();
        match (self.stats.last_event_ts, next) {
            (Some(last), Some(next)) => last.max(next),
            (Some(last), None) => last,
            (None, Some(next)) => next,
            (None, None) => self.stats.added_ts,
        }
    }

    pub fn removed_ts(&self) -> Option<Timestamp> {
        match self.lifecycle {
            Lifecycle::Active => None,
            Lifecycle::Removed { at } => Some(at),
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Removed { .. })
    }

    pub fn last_event(&self) -> Option<&SchedulerEvent> {
        self.last_event.as_ref()
    }

    /// Case-insensitive search over name, status and the latest timestamps.
    pub fn matches(&self, filter: &str) -> bool {
        if filter.is_empty() {
            return true;
        }
        let needle = filter.to_lowercase();

        if self.name.to_lowercase().contains(&needle) {
            return true;
        }
        if let Some(status) = self.stats.current_status {
            if status.as_str().contains(&needle) {
                return true;
            }
        }
        let Some(last) = &self.last_event else {
            return false;
        };
        if format_timestamp(&last.timestamp).contains(&needle) {
            return true;
        }
        last.next_run_times
            .as_ref()
            .and_then(|times| times.first())
            .is_some_and(|next| format_timestamp(next).contains(&needle))
    }

    /// Execution events and bare events together, oldest first.
    pub fn all_events(&self) -> Vec<&SchedulerEvent> {
        let mut all: Vec<&SchedulerEvent> = self
            .executions
            .values()
            .flat_map(|execution| execution.events.iter())
            .chain(self.events.iter())
            .collect();
        all.sort_by_key(|event| event.timestamp);
        all
    }

    /// Executions that have not been closed yet.
    pub fn open_executions(&self) -> impl Iterator<Item = &Execution> {
        self.executions.values().filter(|execution| execution.is_open())
    }
}

impl Aggregate for JobAggregate {
    type Event = SchedulerEvent;

    fn apply(&mut self, event: &SchedulerEvent) -> ApplyOutcome {
        self.apply_event(event)
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn event(kind: EventKind, at: Timestamp, srt: Option<Timestamp>) -> SchedulerEvent {
        let mut event = SchedulerEvent::new(kind, at);
        event.job_id = Some("job".to_string());
        event.scheduled_run_time = srt;
        event
    }

    fn job() -> JobAggregate {
        JobAggregate::new("job", "Nightly report", t0())
    }

    #[test]
    fn test_submitted_then_executed_closes_one_execution() {
        let mut job = job();
        let srt = t0() + Duration::hours(1);
        job.apply_event(&event(EventKind::JobSubmitted, srt, Some(srt)));
        job.apply_event(&event(EventKind::JobExecuted, srt + Duration::minutes(5), Some(srt)));

        assert_eq!(job.executions.len(), 1);
        let execution = &job.executions[&srt];
        assert_eq!(execution.status, EventKind::JobExecuted);
        assert_eq!(execution.start_ts, srt);
        assert_eq!(execution.end_ts, srt + Duration::minutes(5));
        assert_eq!(execution.events.len(), 2);
        assert_eq!(job.stats.current_status, Some(EventKind::JobExecuted));
    }

    #[test]
    fn test_closing_event_backfills_start() {
        let mut job = job();
        let srt = t0() + Duration::hours(1);
        let at = srt + Duration::minutes(3);
        job.apply_event(&event(EventKind::JobExecuted, at, Some(srt)));

        let execution = &job.executions[&srt];
        assert_eq!(execution.start_ts, at);
        assert_eq!(execution.end_ts, at);
    }

    #[test]
    fn test_late_submission_keeps_closed_status() {
        let mut job = job();
        let srt = t0() + Duration::hours(1);
        job.apply_event(&event(EventKind::JobError, srt + Duration::minutes(2), Some(srt)));
        job.apply_event(&event(EventKind::JobSubmitted, srt, Some(srt)));

        let execution = &job.executions[&srt];
        assert_eq!(execution.status, EventKind::JobError);
        assert_eq!(execution.start_ts, srt);
        assert_eq!(execution.end_ts, srt + Duration::minutes(2));
        // The error still holds the high-water mark.
        assert_eq!(job.stats.current_status, Some(EventKind::JobError));
    }

    #[test]
    fn test_out_of_order_events_track_min_and_max() {
        let mut job = job();
        let late = t0() + Duration::hours(3);
        let early = t0() - Duration::hours(2);
        job.apply_event(&event(EventKind::JobModified, late, None));
        job.apply_event(&event(EventKind::JobModified, early, None));

        assert_eq!(job.stats.first_event_ts, Some(early));
        assert_eq!(job.stats.last_event_ts, Some(late));
        assert_eq!(job.min_ts(), early);
        assert_eq!(job.max_ts(), late);
    }

    #[test]
    fn test_next_run_times_replaced_wholesale() {
        let mut job = job();
        let mut first = event(EventKind::JobModified, t0(), None);
        first.next_run_times = Some(vec![t0() + Duration::hours(1), t0() + Duration::hours(2)]);
        job.apply_event(&first);

        let mut second = event(EventKind::JobExecuted, t0() + Duration::minutes(1), None);
        second.next_run_times = Some(vec![t0() + Duration::hours(5)]);
        job.apply_event(&second);

        assert_eq!(job.next_run_times, vec![t0() + Duration::hours(5)]);
        assert_eq!(job.max_ts(), t0() + Duration::hours(5));
    }

    #[test]
    fn test_missing_scheduled_run_time_becomes_bare_event() {
        let mut job = job();
        job.apply_event(&event(EventKind::JobExecuted, t0(), None));

        assert!(job.executions.is_empty());
        assert_eq!(job.events.len(), 1);
        assert_eq!(job.stats.last_event_ts, Some(t0()));
    }

    #[test]
    fn test_removal_is_soft() {
        let mut job = job();
        let srt = t0() + Duration::hours(1);
        job.apply_event(&event(EventKind::JobExecuted, srt, Some(srt)));
        job.apply_event(&event(EventKind::JobRemoved, srt + Duration::hours(1), None));

        assert!(job.is_removed());
        assert_eq!(job.removed_ts(), Some(srt + Duration::hours(1)));
        assert_eq!(job.executions.len(), 1);
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let mut job = job();
        job.apply_event(&event(EventKind::JobMissed, t0(), Some(t0())));

        assert!(job.matches(""));
        assert!(job.matches("NIGHTLY"));
        assert!(job.matches("missed"));
        assert!(job.matches("2024-03-01 10:00"));
        assert!(!job.matches("weekly"));
    }

    #[test]
    fn test_all_events_are_chronological() {
        let mut job = job();
        let srt = t0() + Duration::hours(1);
        job.apply_event(&event(EventKind::JobModified, t0() + Duration::hours(2), None));
        job.apply_event(&event(EventKind::JobSubmitted, srt, Some(srt)));

        let kinds: Vec<EventKind> = job.all_events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::JobSubmitted, EventKind::JobModified]);
    }
}
