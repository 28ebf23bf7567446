//! Jobscope CLI - inspect a running Jobscope server from the terminal.
//!
//! Provides scheduler, job, timeline, live view, health, and configuration
//! commands.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config, health, job, live, scheduler, timeline};
use output::OutputFormat;

/// Jobscope - live scheduler timeline CLI
#[derive(Parser)]
#[command(
    name = "jobscope",
    version,
    about = "Jobscope - live scheduler timeline",
    long_about = "CLI tool for inspecting scheduler state, job history and timelines served by a Jobscope server.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "JOBSCOPE_API_URL")]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the scheduler summary
    Scheduler,

    /// List jobs, most recently active first
    Jobs {
        /// Case-insensitive match on name, status, trigger or id
        #[arg(short, long, default_value = "")]
        filter: String,
    },

    /// Show a job and its event history
    Job {
        /// Job ID
        job_id: String,
    },

    /// Draw the overview or a job's detail timeline
    Timeline(timeline::TimelineArgs),

    /// Live view operations
    #[command(subcommand)]
    Live(live::LiveCommands),

    /// Check server health
    Health,

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .or_else(config::load_api_url)
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let client = client::ApiClient::new(&api_url)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Scheduler => scheduler::execute(&client, format).await,
        Commands::Jobs { filter } => job::list(filter, &client, format).await,
        Commands::Job { job_id } => job::show(job_id, &client, format).await,
        Commands::Timeline(args) => timeline::execute(args, &client, format).await,
        Commands::Live(cmd) => live::execute(cmd, &client, format).await,
        Commands::Health => health::execute(&client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
