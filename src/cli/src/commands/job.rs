//! Job commands: list tracked jobs and show one job's history.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

// ── API types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
struct JobSummary {
    id: String,
    name: String,
    trigger: Option<String>,
    status: Option<String>,
    next_run_time: Option<NaiveDateTime>,
    last_event_ts: Option<NaiveDateTime>,
    removed: bool,
    executions: usize,
    running: usize,
}

#[derive(Debug, Tabled)]
struct JobRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Trigger")]
    trigger: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Runs")]
    executions: usize,
    #[tabled(rename = "Running")]
    running: usize,
    #[tabled(rename = "Last Event")]
    last_event: String,
    #[tabled(rename = "Next Run")]
    next_run: String,
}

impl From<&JobSummary> for JobRow {
    fn from(job: &JobSummary) -> Self {
        let mut status = job.status.clone().unwrap_or_else(|| "-".into());
        if job.removed {
            status.push_str(" (removed)");
        }
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            trigger: job.trigger.clone().unwrap_or_else(|| "-".into()),
            status,
            executions: job.executions,
            running: job.running,
            last_event: output::timestamp(job.last_event_ts),
            next_run: output::timestamp(job.next_run_time),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct JobDetail {
    job: serde_json::Value,
    history: Vec<HistoryEvent>,
}

#[derive(Debug, Deserialize, Serialize)]
struct HistoryEvent {
    kind: String,
    timestamp: NaiveDateTime,
    scheduled_run_time: Option<NaiveDateTime>,
    exception: Option<String>,
}

#[derive(Debug, Tabled)]
struct HistoryRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Event")]
    kind: String,
    #[tabled(rename = "Scheduled For")]
    scheduled_run_time: String,
    #[tabled(rename = "Exception")]
    exception: String,
}

impl From<&HistoryEvent> for HistoryRow {
    fn from(event: &HistoryEvent) -> Self {
        Self {
            timestamp: output::timestamp(Some(event.timestamp)),
            kind: event.kind.clone(),
            scheduled_run_time: output::timestamp(event.scheduled_run_time),
            exception: event.exception.clone().unwrap_or_default(),
        }
    }
}

// ── Execution ───────────────────────────────────────────────────────────────

pub async fn list(filter: String, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let query = if filter.is_empty() {
        Vec::new()
    } else {
        vec![("filter", filter)]
    };
    let jobs: Vec<JobSummary> = client.get("/api/jobs", &query).await?;
    let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
    output::print_list(&rows, &jobs, format)
}

pub async fn show(job_id: String, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let detail: JobDetail = client.get(&format!("/api/jobs/{}", job_id), &[]).await?;

    match format {
        OutputFormat::Table => {
            let field = |key: &str| detail.job.get(key).and_then(|v| v.as_str()).unwrap_or("-").to_string();
            let config = detail.job.get("config");
            let config_field = |key: &str| {
                config
                    .and_then(|c| c.get(key))
                    .and_then(|v| v.as_str())
                    .unwrap_or("-")
                    .to_string()
            };
            let current = detail
                .job
                .get("stats")
                .and_then(|s| s.get("current_status"))
                .and_then(|v| v.as_str());

            output::print_header(&format!("Job {}", field("id")));
            output::print_detail("Name", &field("name"));
            output::print_detail("Function", &config_field("func"));
            output::print_detail("Trigger", &config_field("trigger"));
            output::print_detail("Executor", &config_field("executor"));
            output::print_detail("Status", &output::status(current));

            output::print_header("History");
            let rows: Vec<HistoryRow> = detail.history.iter().map(HistoryRow::from).collect();
            output::print_list(&rows, &detail.history, format)
        }
        _ => output::print_item(&detail, format),
    }
}
