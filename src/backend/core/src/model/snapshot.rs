//! Session snapshot schema.
//!
//! The snapshot is delivered once when a session starts. Each job entry ships
//! its recent history inline (`events`) rather than through the live stream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::event::RawEvent;
use super::scheduler::RunState;

/// Full scheduler state as sent at session start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub scheduler: SchedulerInfo,

    /// Executor alias → opaque descriptor.
    #[serde(default)]
    pub executors: BTreeMap<String, serde_json::Value>,

    /// Jobstore alias → opaque descriptor.
    #[serde(default)]
    pub jobstores: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub jobs: BTreeMap<String, SnapshotJob>,
}

/// Scheduler section of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerInfo {
    #[serde(rename = "class", default)]
    pub class_name: String,

    #[serde(default)]
    pub state: RunState,

    /// IANA timezone name, e.g. `Europe/Berlin`.
    #[serde(default)]
    pub timezone: String,

    #[serde(default)]
    pub jobstore_retry_interval: Option<f64>,

    #[serde(default)]
    pub misfire_grace_time: Option<f64>,

    #[serde(default)]
    pub coalesce: Option<bool>,

    #[serde(default)]
    pub max_instances: Option<u32>,
}

/// One job entry of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotJob {
    pub added_time: String,

    #[serde(default)]
    pub modified_time: Option<String>,

    #[serde(default)]
    pub removed_time: Option<String>,

    pub properties: JobProperties,

    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// Job definition as serialized by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProperties {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub trigger: Option<String>,

    #[serde(default)]
    pub jobstore: Option<String>,

    #[serde(default)]
    pub executor: Option<String>,

    #[serde(default)]
    pub func: Option<String>,

    #[serde(default)]
    pub func_ref: Option<String>,

    #[serde(default)]
    pub args: Option<serde_json::Value>,

    #[serde(default)]
    pub kwargs: Option<serde_json::Value>,

    #[serde(default)]
    pub pending: Option<bool>,

    #[serde(default)]
    pub coalesce: Option<bool>,

    /// Upcoming run times; `null` when the job is paused or finished.
    #[serde(default)]
    pub next_run_time: Option<Vec<String>>,

    #[serde(default)]
    pub misfire_grace_time: Option<f64>,

    #[serde(default)]
    pub max_instances: Option<u32>,
}

impl JobProperties {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_deserializes_scheduler_payload() {
        let json = r#"{
            "scheduler": {
                "class": "BackgroundScheduler",
                "state": "running",
                "timezone": "Europe/Berlin",
                "jobstore_retry_interval": 10.0,
                "misfire_grace_time": 1,
                "coalesce": true,
                "max_instances": 3
            },
            "executors": {"default": "ThreadPoolExecutor"},
            "jobstores": {"default": "MemoryJobStore"},
            "jobs": {
                "cleanup": {
                    "added_time": "2024-03-01 09:00:00.000000",
                    "modified_time": "2024-03-01 09:00:00.000000",
                    "removed_time": null,
                    "properties": {
                        "id": "cleanup",
                        "name": "Cleanup",
                        "trigger": "interval[0:10:00]",
                        "jobstore": "default",
                        "executor": "default",
                        "func": "<function cleanup>",
                        "func_ref": "tasks:cleanup",
                        "args": "()",
                        "kwargs": "{}",
                        "pending": false,
                        "coalesce": true,
                        "next_run_time": ["2024-03-01 09:10:00.000000"],
                        "misfire_grace_time": 1,
                        "max_instances": 1
                    },
                    "events": [
                        {"event_name": "job_added", "event_ts": "2024-03-01 09:00:00.000000", "job_id": "cleanup"}
                    ]
                }
            }
        }"#;

        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.scheduler.class_name, "BackgroundScheduler");
        assert_eq!(snapshot.scheduler.state, RunState::Running);
        assert_eq!(snapshot.executors.len(), 1);

        let job = &snapshot.jobs["cleanup"];
        assert_eq!(job.properties.func_ref.as_deref(), Some("tasks:cleanup"));
        assert_eq!(job.events.len(), 1);
        assert_eq!(job.removed_time, None);
    }
}
