//! Integration tests for stream ingestion.

use std::io::Write;

use jobscope_core::error::ErrorCode;
use jobscope_core::ingest::{ChannelSource, Ingestor, JsonLinesSource, ModelStore, StreamMessage};
use jobscope_core::model::{EventKind, RawEvent, RunState, Snapshot};
use tokio_util::sync::CancellationToken;

const STREAM: &str = r#"{"type": "job_event", "data": {"event_name": "job_submitted", "event_ts": "2024-03-01 09:59:00", "job_id": "early", "scheduled_run_time": "2024-03-01 09:59:00"}}
{"type": "init_jobs", "data": {"scheduler": {"class": "AsyncIOScheduler", "state": "running", "timezone": "UTC"}, "executors": {"default": "AsyncIOExecutor"}, "jobs": {}}}
{"type": "job_event", "data": {"event_name": "job_added", "event_ts": "2024-03-01 10:00:00", "job_id": "poll", "properties": {"id": "poll", "name": "Poll feeds", "trigger": "interval[0:05:00]", "next_run_time": ["2024-03-01 10:05:00"]}}}

this line is not json
{"type": "job_event", "data": {"event_name": "job_submitted", "event_ts": "2024-03-01 10:05:00.012000", "job_id": "poll", "scheduled_run_time": "2024-03-01 10:05:00"}}
{"type": "executor_event", "data": {"event_name": "executor_added", "event_ts": "2024-03-01 10:05:01", "alias": "pool"}}
{"type": "job_event", "data": {"event_name": "job_executed", "event_ts": "2024-03-01 10:05:03", "job_id": "poll", "scheduled_run_time": "2024-03-01 10:05:00", "next_run_times": ["2024-03-01 10:10:00"]}}
{"type": "scheduler_event", "data": {"event_name": "scheduler_paused", "event_ts": "2024-03-01 10:06:00"}}
"#;

fn stream_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_ingest_json_lines_file() {
    let file = stream_file(STREAM);
    let store = ModelStore::new();
    let ingestor = Ingestor::new(store.clone());

    let source = JsonLinesSource::open(file.path()).await.unwrap();
    let summary = ingestor.run(source, CancellationToken::new()).await.unwrap();

    // The undecodable line is skipped by the source, not counted.
    assert_eq!(summary.messages, 7);
    assert_eq!(summary.sessions, 1);
    assert_eq!(summary.events.ignored, 1);
    assert_eq!(summary.events.acknowledged, 1);
    assert_eq!(summary.events.applied, 4);
    assert_eq!(summary.events.total() as u64, summary.messages - summary.sessions);

    store
        .read(|scheduler| {
            assert_eq!(scheduler.state, RunState::Paused);
            assert!(scheduler.job("early").is_none());

            let job = scheduler.job("poll").unwrap();
            assert_eq!(job.name, "Poll feeds");
            assert_eq!(job.config.trigger.as_deref(), Some("interval[0:05:00]"));
            assert_eq!(job.executions.len(), 1);
            assert_eq!(job.stats.current_status, Some(EventKind::JobExecuted));
            assert_eq!(job.next_run_times.len(), 1);
        })
        .unwrap();
}

#[tokio::test]
async fn test_missing_file_is_an_ingest_error() {
    let err = match JsonLinesSource::open("/nonexistent/jobscope/stream.jsonl").await {
        Ok(_) => panic!("opening a missing file should fail"),
        Err(err) => err,
    };
    assert_eq!(err.code(), ErrorCode::IngestIoError);
}

#[tokio::test]
async fn test_second_snapshot_restarts_session() {
    let store = ModelStore::new();
    let ingestor = Ingestor::new(store.clone());

    ingestor.handle(&StreamMessage::InitJobs(Snapshot::default()));
    let first = store.read(|s| s.session_id).unwrap();
    ingestor.handle(&StreamMessage::JobEvent(
        RawEvent::new("job_added", "2024-03-01 10:00:00").for_job("a"),
    ));
    assert_eq!(store.read(|s| s.jobs.len()).unwrap(), 1);

    ingestor.handle(&StreamMessage::InitJobs(Snapshot::default()));
    let second = store.read(|s| s.session_id).unwrap();
    assert_ne!(first, second);
    assert_eq!(store.read(|s| s.jobs.len()).unwrap(), 0);
}

#[tokio::test]
async fn test_channel_ingest_until_cancelled() {
    let store = ModelStore::new();
    let (sender, source) = ChannelSource::channel(8);
    let cancel = CancellationToken::new();
    let task = Ingestor::new(store.clone()).spawn(source, cancel.clone());

    let mut changes = store.subscribe();
    sender
        .send(StreamMessage::InitJobs(Snapshot::default()))
        .await
        .unwrap();
    changes.changed().await.unwrap();
    assert!(store.is_initialized());

    cancel.cancel();
    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.sessions, 1);
}
