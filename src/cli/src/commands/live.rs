//! Live view commands: show the latest published frame and change the
//! server-side view parameters.

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};

use super::timeline::{self, Scene};
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum LiveCommands {
    /// Show the most recently published frame
    Show,

    /// Change the live view width
    Resize {
        /// Viewport width in pixels
        width: u32,
    },

    /// Change the live view job filter
    Filter {
        /// Filter text; empty clears it
        #[arg(default_value = "")]
        text: String,
    },

    /// Change the live view interval
    Interval {
        /// second, minute, hour, day or milliseconds
        interval: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum ViewCommand {
    Resize { width: u32 },
    Filter { text: String },
    Interval { interval: String },
}

#[derive(Debug, Deserialize, Serialize)]
struct Animation {
    frame_period: String,
    frames: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize)]
struct LiveFrame {
    generation: u64,
    revision: u64,
    scene: Scene,
    animation: Animation,
}

pub async fn execute(cmd: LiveCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let command = match cmd {
        LiveCommands::Show => {
            let frame: LiveFrame = client.get("/api/timeline/live", &[]).await?;
            return match format {
                OutputFormat::Table => {
                    timeline::print_scene(&frame.scene);
                    output::print_detail("Generation", &frame.generation.to_string());
                    output::print_detail("Model revision", &frame.revision.to_string());
                    output::print_detail(
                        "Animation",
                        &format!("{} frames every {}", frame.animation.frames.len(), frame.animation.frame_period),
                    );
                    Ok(())
                }
                _ => output::print_item(&frame, format),
            };
        }
        LiveCommands::Resize { width } => ViewCommand::Resize { width },
        LiveCommands::Filter { text } => ViewCommand::Filter { text },
        LiveCommands::Interval { interval } => ViewCommand::Interval { interval },
    };

    let accepted: serde_json::Value = client.post("/api/timeline/live", &command).await?;
    match format {
        OutputFormat::Table => {
            output::print_success("Live view updated");
            Ok(())
        }
        _ => output::print_item(&accepted, format),
    }
}
