//! Health check command.
//!
//! Queries `/health` and reports whether the server has seen a snapshot yet.

use anyhow::Result;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

pub async fn execute(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: serde_json::Value = client.get_raw("/health").await?;

    match format {
        OutputFormat::Table => {
            let status = health.get("status").and_then(|v| v.as_str()).unwrap_or("unknown");
            let initialized = health
                .get("session_initialized")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            output::print_header("Server Health");
            output::print_detail("Status", status);
            output::print_detail("API URL", client.base_url());
            if let Some(version) = health.get("version").and_then(|v| v.as_str()) {
                output::print_detail("Version", version);
            }
            if let Some(revision) = health.get("revision").and_then(|v| v.as_u64()) {
                output::print_detail("Model revision", &revision.to_string());
            }

            if status != "healthy" {
                output::print_error(&format!("Server status: {}", status));
            } else if initialized {
                output::print_success("Receiving scheduler events");
            } else {
                output::print_info("Waiting for the scheduler snapshot");
            }
            Ok(())
        }
        _ => output::print_item(&health, format),
    }
}
