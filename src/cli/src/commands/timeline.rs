//! Timeline command.
//!
//! Fetches a computed scene and draws it as one text strip per lane.

use anyhow::Result;
use chrono::NaiveDateTime;
use clap::Args;
use colored::*;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

/// Columns per interval in the text strip.
const COLUMNS_PER_INTERVAL: usize = 3;

#[derive(Args)]
pub struct TimelineArgs {
    /// Show the detail view of one job instead of the overview
    #[arg(short, long)]
    job: Option<String>,

    /// Viewport width in pixels
    #[arg(short, long)]
    width: Option<u32>,

    /// Interval: second, minute, hour, day or milliseconds
    #[arg(short, long)]
    interval: Option<String>,

    /// Job filter (overview only)
    #[arg(short, long)]
    filter: Option<String>,

    /// List every bar instead of drawing lanes
    #[arg(long)]
    bars: bool,
}

// ── API types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Bar {
    pub job_id: String,
    pub lane: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: String,
    pub animatable: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Point {
    pub job_id: String,
    pub lane: usize,
    pub at: NaiveDateTime,
    pub marker: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct JobLabel {
    pub job_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Scene {
    pub now: NaiveDateTime,
    pub window: Window,
    pub interval: String,
    pub intervals: u32,
    pub visible_job_count: usize,
    pub bars: Vec<Bar>,
    pub points: Vec<Point>,
    #[serde(default)]
    pub job_labels: Vec<JobLabel>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TimelineResponse {
    scene: Scene,
}

#[derive(Debug, Tabled)]
struct BarRow {
    #[tabled(rename = "Job")]
    job_id: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Status")]
    status: String,
}

// ── Execution ───────────────────────────────────────────────────────────────

pub async fn execute(args: TimelineArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let mut query = Vec::new();
    if let Some(width) = args.width {
        query.push(("width", width.to_string()));
    }
    if let Some(interval) = &args.interval {
        query.push(("interval", interval.clone()));
    }
    let path = match &args.job {
        Some(job_id) => format!("/api/jobs/{}/timeline", job_id),
        None => {
            if let Some(filter) = &args.filter {
                query.push(("filter", filter.clone()));
            }
            "/api/timeline".to_string()
        }
    };

    let response: TimelineResponse = client.get(&path, &query).await?;
    let scene = response.scene;

    match format {
        OutputFormat::Table if args.bars => {
            let rows: Vec<BarRow> = scene
                .bars
                .iter()
                .map(|bar| BarRow {
                    job_id: bar.job_id.clone(),
                    start: output::timestamp(Some(bar.start)),
                    end: if bar.animatable {
                        "running".to_string()
                    } else {
                        output::timestamp(Some(bar.end))
                    },
                    status: bar.status.clone(),
                })
                .collect();
            output::print_list(&rows, &scene.bars, format)
        }
        OutputFormat::Table => {
            print_scene(&scene);
            Ok(())
        }
        _ => output::print_item(&scene, format),
    }
}

/// Draw `scene` as a header plus one strip per lane.
pub fn print_scene(scene: &Scene) {
    output::print_header(&format!(
        "Timeline {} .. {} ({} x {})",
        output::timestamp(Some(scene.window.start)),
        output::timestamp(Some(scene.window.end)),
        scene.intervals,
        scene.interval
    ));

    if scene.visible_job_count == 0 {
        println!("{}", "No jobs in this window.".dimmed());
        return;
    }

    let columns = scene.intervals as usize * COLUMNS_PER_INTERVAL;
    let mut lanes = vec![vec![' '; columns]; scene.visible_job_count];
    let column = |ts: NaiveDateTime| column_of(&scene.window, ts, columns);

    for bar in &scene.bars {
        let Some(lane) = lanes.get_mut(bar.lane) else {
            continue;
        };
        let glyph = if bar.animatable { '>' } else { '=' };
        for cell in &mut lane[column(bar.start)..=column(bar.end)] {
            *cell = glyph;
        }
    }
    for point in &scene.points {
        if let Some(lane) = lanes.get_mut(point.lane) {
            lane[column(point.at)] = marker_glyph(&point.marker);
        }
    }
    let now = column(scene.now);

    let label_width = scene.job_labels.iter().map(|l| l.text.len()).max().unwrap_or(0).max(8);
    for (index, lane) in lanes.iter_mut().enumerate() {
        if lane[now] == ' ' {
            lane[now] = '|';
        }
        let label = scene
            .job_labels
            .get(index)
            .map(|l| l.text.as_str())
            .or_else(|| scene.bars.iter().find(|b| b.lane == index).map(|b| b.job_id.as_str()))
            .unwrap_or("");
        let strip: String = lane.iter().collect();
        let label = format!("{:>width$}", label, width = label_width);
        println!("{} {}{}{}", label.bold(), "[".dimmed(), strip, "]".dimmed());
    }
    println!();
    println!(
        "{}",
        "= executed  > running  x error/missed  + added  ~ modified  - removed  o scheduled  | now".dimmed()
    );
}

fn column_of(window: &Window, ts: NaiveDateTime, columns: usize) -> usize {
    let span = (window.end - window.start).num_milliseconds().max(1);
    let offset = (ts - window.start).num_milliseconds().clamp(0, span);
    let col = (offset as f64 / span as f64 * columns as f64) as usize;
    col.min(columns.saturating_sub(1))
}

fn marker_glyph(marker: &str) -> char {
    match marker {
        "missed" | "error" | "max_instances" => 'x',
        "added" => '+',
        "modified" => '~',
        "removed" => '-',
        "scheduled" => 'o',
        "executed" => '=',
        "running" | "submitted" => '>',
        _ => '*',
    }
}
