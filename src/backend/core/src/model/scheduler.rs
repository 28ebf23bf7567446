//! Scheduler aggregate: session-scoped root of the model.
//!
//! Created from a [`Snapshot`] when a session starts and mutated in place by
//! every subsequent event. Job-scoped events are routed to the addressed
//! [`JobAggregate`]; events that cannot be placed are dropped, logged and
//! counted, never surfaced as errors.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::event::{EventKind, RawEvent, SchedulerEvent};
use super::job::JobAggregate;
use super::snapshot::Snapshot;
use super::{Aggregate, ApplyOutcome, IgnoreReason, ReplaySummary};
use crate::telemetry::metrics::EventMetrics;

/// Run state of the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler-wide job defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerDefaults {
    pub jobstore_retry_interval: Option<f64>,
    pub misfire_grace_time: Option<f64>,
    pub coalesce: Option<bool>,
    pub max_instances: Option<u32>,
}

/// Resolve an IANA timezone name, falling back to UTC.
pub fn resolve_timezone(name: &str) -> Tz {
    if name.is_empty() {
        return Tz::UTC;
    }
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(timezone = %name, "Unknown scheduler timezone, falling back to UTC");
            Tz::UTC
        }
    }
}

// =============================================================================
// Scheduler Aggregate
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerAggregate {
    /// Identifies the session this model belongs to; changes on re-initialization.
    pub session_id: Uuid,
    pub class_name: String,
    pub state: RunState,
    /// Timezone name as reported by the scheduler.
    pub timezone: String,
    #[serde(skip)]
    tz: Tz,
    pub defaults: SchedulerDefaults,
    pub executors: BTreeMap<String, serde_json::Value>,
    pub jobstores: BTreeMap<String, serde_json::Value>,
    pub jobs: BTreeMap<String, JobAggregate>,
    pub version: u64,
}

impl SchedulerAggregate {
    /// Build the model from a session snapshot, replaying each job's embedded
    /// events in their original order.
    pub fn initialize(snapshot: &Snapshot) -> Self {
        let info = &snapshot.scheduler;
        let tz = resolve_timezone(&info.timezone);

        let mut scheduler = Self {
            session_id: Uuid::new_v4(),
            class_name: info.class_name.clone(),
            state: info.state,
            timezone: info.timezone.clone(),
            tz,
            defaults: SchedulerDefaults {
                jobstore_retry_interval: info.jobstore_retry_interval,
                misfire_grace_time: info.misfire_grace_time,
                coalesce: info.coalesce,
                max_instances: info.max_instances,
            },
            executors: snapshot.executors.clone(),
            jobstores: snapshot.jobstores.clone(),
            jobs: BTreeMap::new(),
            version: 0,
        };

        let mut summary = ReplaySummary::default();
        for (job_id, entry) in &snapshot.jobs {
            let mut job = match JobAggregate::from_snapshot(entry, &tz) {
                Ok(job) => job,
                Err(err) => {
                    warn!(job_id = %job_id, error = %err, "Skipping snapshot job");
                    EventMetrics::record_dropped(IgnoreReason::from(err).label());
                    continue;
                }
            };
            job.id = job_id.clone();

            for raw in &entry.events {
                let outcome = match SchedulerEvent::normalize(raw, &tz) {
                    Ok(event) => job.apply_event(&event),
                    Err(err) => scheduler.drop_event(&raw.kind, err.into()),
                };
                summary.record(&outcome);
            }
            scheduler.jobs.insert(job_id.clone(), job);
        }

        EventMetrics::set_jobs_tracked(scheduler.jobs.len());
        info!(
            session_id = %scheduler.session_id,
            scheduler = %scheduler.class_name,
            state = %scheduler.state,
            timezone = %scheduler.tz,
            jobs = scheduler.jobs.len(),
            replayed = summary.applied,
            ignored = summary.ignored,
            "Scheduler model initialized"
        );

        scheduler
    }

    /// The scheduler's timezone, used to interpret wire timestamps and "now".
    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn job(&self, job_id: &str) -> Option<&JobAggregate> {
        self.jobs.get(job_id)
    }

    /// Normalize and apply one wire event.
    pub fn apply_raw(&mut self, raw: &RawEvent) -> ApplyOutcome {
        match SchedulerEvent::normalize(raw, &self.tz) {
            Ok(event) => self.apply_event(&event),
            Err(err) => {
                self.version += 1;
                self.drop_event(&raw.kind, err.into())
            }
        }
    }

    /// Apply one normalized event.
    pub fn apply_event(&mut self, event: &SchedulerEvent) -> ApplyOutcome {
        self.version += 1;

        let outcome = match event.kind {
            EventKind::SchedulerStarted | EventKind::SchedulerResumed => {
                self.set_state(event.kind, RunState::Running)
            }
            EventKind::SchedulerShutdown => self.set_state(event.kind, RunState::Stopped),
            EventKind::SchedulerPaused => self.set_state(event.kind, RunState::Paused),
            EventKind::ExecutorAdded
            | EventKind::ExecutorRemoved
            | EventKind::JobstoreAdded
            | EventKind::JobstoreRemoved => {
                debug!(kind = %event.kind, alias = ?event.alias, "Registry event acknowledged");
                ApplyOutcome::Acknowledged { kind: event.kind }
            }
            EventKind::JobAdded => self.on_job_added(event),
            EventKind::AllJobsRemoved => self.on_all_jobs_removed(event),
            kind if kind.is_job_scoped() => self.forward_to_job(event),
            _ => ApplyOutcome::Acknowledged { kind: event.kind },
        };

        match &outcome {
            ApplyOutcome::Ignored { reason } => {
                EventMetrics::record_dropped(reason.label());
            }
            _ => EventMetrics::record(event.kind.as_str(), outcome.label()),
        }
        outcome
    }

    fn set_state(&mut self, kind: EventKind, state: RunState) -> ApplyOutcome {
        debug!(from = %self.state, to = %state, "Scheduler state changed");
        self.state = state;
        ApplyOutcome::Applied { kind }
    }

    fn on_job_added(&mut self, event: &SchedulerEvent) -> ApplyOutcome {
        let job_id = event
            .job_id
            .clone()
            .or_else(|| event.definition.as_ref().map(|d| d.id.clone()))
            .filter(|id| !id.is_empty());
        let Some(job_id) = job_id else {
            return self.ignore(IgnoreReason::MissingJobId { kind: event.kind });
        };

        match self.jobs.get_mut(&job_id) {
            Some(job) => {
                debug!(job_id = %job_id, "Existing job re-added, refreshing");
                job.reactivate(event);
                job.apply_event(event);
            }
            None => {
                let mut job = JobAggregate::from_added_event(&job_id, event);
                job.apply_event(event);
                self.jobs.insert(job_id.clone(), job);
                EventMetrics::set_jobs_tracked(self.jobs.len());
                debug!(job_id = %job_id, "Job added");
            }
        }

        ApplyOutcome::Applied { kind: event.kind }
    }

    fn on_all_jobs_removed(&mut self, event: &SchedulerEvent) -> ApplyOutcome {
        for (job_id, job) in self.jobs.iter_mut() {
            job.apply_event(&SchedulerEvent::synthetic_removal(event, job_id));
        }
        debug!(jobs = self.jobs.len(), "All jobs removed");
        ApplyOutcome::Applied { kind: event.kind }
    }

    fn forward_to_job(&mut self, event: &SchedulerEvent) -> ApplyOutcome {
        let Some(job_id) = event.job_id.as_deref() else {
            return self.ignore(IgnoreReason::MissingJobId { kind: event.kind });
        };
        match self.jobs.get_mut(job_id) {
            Some(job) => job.apply_event(event),
            None => self.ignore(IgnoreReason::UnknownJob {
                kind: event.kind,
                job_id: job_id.to_string(),
            }),
        }
    }

    fn ignore(&self, reason: IgnoreReason) -> ApplyOutcome {
        warn!(reason = reason.label(), detail = ?reason, "Dropping scheduler event");
        ApplyOutcome::ignored(reason)
    }

    fn drop_event(&self, kind: &str, reason: IgnoreReason) -> ApplyOutcome {
        warn!(kind = %kind, reason = reason.label(), detail = ?reason, "Dropping scheduler event");
        EventMetrics::record_dropped(reason.label());
        ApplyOutcome::ignored(reason)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Jobs matching `filter`, most recently active first.
    pub fn matching_jobs<'a>(&'a self, filter: &'a str) -> impl Iterator<Item = &'a JobAggregate> + 'a {
        let mut jobs: Vec<&JobAggregate> = self.jobs.values().filter(|job| job.matches(filter)).collect();
        jobs.sort_by(|a, b| b.stats.last_event_ts.cmp(&a.stats.last_event_ts));
        jobs.into_iter()
    }

    pub fn active_job_count(&self) -> usize {
        self.jobs.values().filter(|job| !job.is_removed()).count()
    }
}

impl Aggregate for SchedulerAggregate {
    type Event = RawEvent;

    fn apply(&mut self, event: &RawEvent) -> ApplyOutcome {
        self.apply_raw(event)
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::snapshot::{JobProperties, SchedulerInfo, SnapshotJob};

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot {
            scheduler: SchedulerInfo {
                class_name: "BackgroundScheduler".to_string(),
                state: RunState::Running,
                timezone: "UTC".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        snapshot.jobs.insert(
            "report".to_string(),
            SnapshotJob {
                added_time: "2024-03-01 09:00:00".to_string(),
                modified_time: None,
                removed_time: None,
                properties: JobProperties::new("report", "Daily report"),
                events: vec![RawEvent::new("job_added", "2024-03-01 09:00:00").for_job("report")],
            },
        );
        snapshot
    }

    #[test]
    fn test_initialize_replays_embedded_events() {
        let scheduler = SchedulerAggregate::initialize(&snapshot());
        let job = scheduler.job("report").unwrap();
        assert_eq!(job.name, "Daily report");
        assert_eq!(job.version, 1);
        assert_eq!(scheduler.state, RunState::Running);
    }

    #[test]
    fn test_scheduler_state_transitions() {
        let mut scheduler = SchedulerAggregate::initialize(&snapshot());
        scheduler.apply_raw(&RawEvent::new("scheduler_paused", "2024-03-01 10:00:00"));
        assert_eq!(scheduler.state, RunState::Paused);
        let outcome = scheduler.apply_raw(&RawEvent::new("scheduler_resumed", "2024-03-01 10:01:00"));
        assert_eq!(scheduler.state, RunState::Running);
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                kind: EventKind::SchedulerResumed
            }
        );
        scheduler.apply_raw(&RawEvent::new("scheduler_shutdown", "2024-03-01 10:02:00"));
        assert_eq!(scheduler.state, RunState::Stopped);
    }

    #[test]
    fn test_registry_events_are_acknowledged() {
        let mut scheduler = SchedulerAggregate::initialize(&snapshot());
        let outcome = scheduler.apply_raw(&RawEvent::new("executor_added", "2024-03-01 10:00:00"));
        assert_eq!(
            outcome,
            ApplyOutcome::Acknowledged {
                kind: EventKind::ExecutorAdded
            }
        );
        assert!(!outcome.mutated());
    }

    #[test]
    fn test_unknown_job_is_dropped() {
        let mut scheduler = SchedulerAggregate::initialize(&snapshot());
        let outcome = scheduler.apply_raw(
            &RawEvent::new("job_executed", "2024-03-01 10:00:00")
                .for_job("ghost")
                .with_scheduled_run_time("2024-03-01 10:00:00"),
        );
        assert_eq!(
            outcome,
            ApplyOutcome::ignored(IgnoreReason::UnknownJob {
                kind: EventKind::JobExecuted,
                job_id: "ghost".to_string()
            })
        );
        assert!(!scheduler.jobs.contains_key("ghost"));
    }

    #[test]
    fn test_unknown_kind_is_dropped() {
        let mut scheduler = SchedulerAggregate::initialize(&snapshot());
        let outcome = scheduler.apply_raw(&RawEvent::new("job_exploded", "2024-03-01 10:00:00"));
        assert!(matches!(
            outcome,
            ApplyOutcome::Ignored {
                reason: IgnoreReason::UnknownKind { .. }
            }
        ));
    }

    #[test]
    fn test_bad_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timezone("Mars/Olympus"), Tz::UTC);
        assert_eq!(resolve_timezone(""), Tz::UTC);
        assert_eq!(resolve_timezone("Europe/Berlin").name(), "Europe/Berlin");
    }
}
