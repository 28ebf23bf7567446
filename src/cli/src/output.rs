//! Output formatting for the Jobscope CLI.
//!
//! Supports table, JSON, and YAML output formats.

use anyhow::Result;
use chrono::NaiveDateTime;
use clap::ValueEnum;
use colored::*;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Render as a formatted table
    #[default]
    Table,
    /// Render as JSON
    Json,
    /// Render as YAML
    Yaml,
}

pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", "[INFO]".blue().bold(), msg);
}

/// Print rows as a table, or the serializable source as JSON/YAML.
pub fn print_list<R: Tabled, S: Serialize + ?Sized>(rows: &[R], source: &S, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No results found.".dimmed());
                return Ok(());
            }
            let table = Table::new(rows)
                .with(Style::rounded())
                .with(Modify::new(Columns::first()).with(Alignment::left()))
                .to_string();
            println!("{}", table);
            Ok(())
        }
        _ => print_item(source, format),
    }
}

/// Print a single item as JSON or YAML; table output falls back to JSON.
pub fn print_item<T: Serialize + ?Sized>(item: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table | OutputFormat::Json => println!("{}", serde_json::to_string_pretty(item)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(item)?),
    }
    Ok(())
}

pub fn print_detail(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold().underline());
    println!();
}

/// Scheduler-local wall time, to the second.
pub fn timestamp(ts: Option<NaiveDateTime>) -> String {
    ts.map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Colour an event kind the way the timeline colours its markers.
pub fn status(kind: Option<&str>) -> String {
    match kind {
        Some(kind @ "job_executed") => kind.green().to_string(),
        Some(kind @ ("job_error" | "job_max_instances")) => kind.red().to_string(),
        Some(kind @ "job_missed") => kind.yellow().to_string(),
        Some(kind @ "job_submitted") => kind.blue().to_string(),
        Some(kind) => kind.to_string(),
        None => "-".dimmed().to_string(),
    }
}
