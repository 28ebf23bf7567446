//! Scheduler summary command.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Debug, Deserialize, Serialize)]
struct SchedulerSummary {
    session_id: Uuid,
    class_name: String,
    state: String,
    timezone: String,
    #[serde(default)]
    defaults: serde_json::Value,
    #[serde(default)]
    executors: Vec<String>,
    #[serde(default)]
    jobstores: Vec<String>,
    job_count: usize,
    active_job_count: usize,
    version: u64,
}

pub async fn execute(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let summary: SchedulerSummary = client.get("/api/scheduler", &[]).await?;

    match format {
        OutputFormat::Table => {
            output::print_header("Scheduler");
            output::print_detail("Class", &summary.class_name);
            output::print_detail("State", &summary.state);
            output::print_detail("Timezone", &summary.timezone);
            output::print_detail("Session", &summary.session_id.to_string());
            output::print_detail(
                "Jobs",
                &format!("{} ({} active)", summary.job_count, summary.active_job_count),
            );
            output::print_detail("Executors", &join_or_dash(&summary.executors));
            output::print_detail("Job stores", &join_or_dash(&summary.jobstores));
            output::print_detail("Events applied", &summary.version.to_string());
            Ok(())
        }
        _ => output::print_item(&summary, format),
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
