//! Timeline layout engine.
//!
//! Turns the scheduler model into a renderable [`Scene`]: a window of time
//! centered on "now", one lane per visible job, execution bars, point markers,
//! grid lines, job cards and a now-marker. The computation only reads the
//! model; calling it twice with the same inputs yields equal scenes.
//!
//! Horizontal positions are wall-clock [`Timestamp`]s in the scheduler's
//! timezone. Vertical positions are pixels from the top of the plot.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::aesthetics::{self, MarkerKind, MarkerStyle};
use super::interval::{saturating_add, saturating_sub, TimeInterval};
use crate::error::{ErrorCode, JobscopeError, Result};
use crate::model::{EventKind, JobAggregate, SchedulerAggregate, Timestamp};
use crate::telemetry::metrics::LayoutMetrics;

// =============================================================================
// Parameters
// =============================================================================

/// Which view a scene is computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewMode {
    /// All jobs passing the filter, with cards, labels and grid.
    Overview,
    /// A single job in one undecorated lane.
    Detail { job_id: String },
}

impl ViewMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Detail { .. } => "detail",
        }
    }

    fn decorated(&self) -> bool {
        matches!(self, Self::Overview)
    }
}

pub const DEFAULT_WIDTH: u32 = 1300;
pub const DEFAULT_INTERVAL_PX: u32 = 60;
pub const DEFAULT_MIN_INTERVALS: u32 = 12;
pub const DETAIL_MIN_INTERVALS: u32 = 6;
/// Widest accepted viewport, in pixels.
pub const MAX_WIDTH: u32 = 20_000;

/// Inputs of one layout besides the model and "now".
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    pub view: ViewMode,
    /// Target viewport width in pixels.
    pub width: u32,
    pub interval: TimeInterval,
    /// Pixels per interval.
    pub interval_px: u32,
    /// Lower bound on the number of intervals in the window.
    pub min_intervals: u32,
    /// Free-text job filter; ignored by the detail view.
    pub filter: String,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self::overview(DEFAULT_WIDTH, TimeInterval::default())
    }
}

impl LayoutParams {
    pub fn overview(width: u32, interval: TimeInterval) -> Self {
        Self {
            view: ViewMode::Overview,
            width,
            interval,
            interval_px: DEFAULT_INTERVAL_PX,
            min_intervals: DEFAULT_MIN_INTERVALS,
            filter: String::new(),
        }
    }

    /// Parameters for the single-job view, with an interval scaled to the job.
    pub fn detail(job: &JobAggregate, width: u32) -> Self {
        Self {
            view: ViewMode::Detail {
                job_id: job.id.clone(),
            },
            width,
            interval: TimeInterval::auto_for_job(job),
            interval_px: DEFAULT_INTERVAL_PX,
            min_intervals: DETAIL_MIN_INTERVALS,
            filter: String::new(),
        }
    }

    /// Accept `width` if it lies in `1..=MAX_WIDTH`.
    pub fn checked_width(width: u32) -> Result<u32> {
        if (1..=MAX_WIDTH).contains(&width) {
            return Ok(width);
        }
        Err(JobscopeError::new(
            ErrorCode::InvalidViewport,
            format!("Width must be between 1 and {MAX_WIDTH} pixels"),
        )
        .with_context("width", width))
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_interval_px(mut self, interval_px: u32) -> Self {
        self.interval_px = interval_px.max(1);
        self
    }

    pub fn with_min_intervals(mut self, min_intervals: u32) -> Self {
        self.min_intervals = min_intervals;
        self
    }

    /// Number of intervals in the window; always even.
    pub fn intervals(&self) -> u32 {
        let px = i64::from(self.interval_px.max(1));
        let fitting = (i64::from(self.width) - 2 * px).div_euclid(px);
        let n = fitting.max(i64::from(self.min_intervals)).max(0) as u32;
        n + n % 2
    }

    /// Plot width in pixels, including one interval of padding each side.
    pub fn plot_width(&self) -> u32 {
        (self.intervals() + 2) * self.interval_px
    }
}

/// Vertical geometry of lanes and cards, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneGeometry {
    pub top_padding: u32,
    pub lane_height: u32,
    /// Axis position of the first lane.
    pub first_lane_y: u32,
    pub bottom_padding: u32,
    pub card_above: u32,
    pub card_below: u32,
    pub label_offset: u32,
    /// Horizontal card padding on each side.
    pub card_padding_px: u32,
    pub card_radius_px: u32,
    pub detail_height: u32,
    pub now_marker_inset: u32,
}

impl Default for LaneGeometry {
    fn default() -> Self {
        Self {
            top_padding: 16,
            lane_height: 86,
            first_lane_y: 66,
            bottom_padding: 40,
            card_above: 50,
            card_below: 20,
            label_offset: 34,
            card_padding_px: 20,
            card_radius_px: 5,
            detail_height: 70,
            now_marker_inset: 3,
        }
    }
}

impl LaneGeometry {
    fn lane_y(&self, lane: usize) -> f64 {
        f64::from(self.first_lane_y) + lane as f64 * f64::from(self.lane_height)
    }

    fn lanes_bottom(&self, lanes: usize) -> f64 {
        f64::from(self.top_padding) + lanes as f64 * f64::from(self.lane_height)
    }
}

// =============================================================================
// Scene
// =============================================================================

/// Visible time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Window {
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// A duration bar for one execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub job_id: String,
    pub lane: usize,
    pub y: f64,
    pub scheduled_run_time: Timestamp,
    pub start: Timestamp,
    pub end: Timestamp,
    pub status: EventKind,
    pub style: MarkerStyle,
    pub animatable: bool,
}

/// A point-in-time marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub job_id: String,
    pub lane: usize,
    pub y: f64,
    pub at: Timestamp,
    pub marker: MarkerKind,
    pub style: MarkerStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GridLineKind {
    Border,
    Minor,
}

/// A vertical grid line spanning all lanes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLine {
    pub at: Timestamp,
    pub kind: GridLineKind,
    pub y0: f64,
    pub y1: f64,
    pub color: &'static str,
    pub width: u32,
}

/// Rounded background card behind a job's lane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobCard {
    pub job_id: String,
    pub lane: usize,
    pub x0: Timestamp,
    pub x1: Timestamp,
    pub y0: f64,
    pub y1: f64,
    /// Outline on the epoch-millisecond axis, as an SVG path.
    pub path: String,
    pub fill: &'static str,
    pub opacity: f64,
}

/// Horizontal axis line across a job's clipped extent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisLine {
    pub job_id: String,
    pub x0: Timestamp,
    pub x1: Timestamp,
    pub y: f64,
    pub color: &'static str,
    pub width: u32,
    pub opacity: f64,
}

/// Job name anchored at the left edge of its card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobLabel {
    pub job_id: String,
    pub text: String,
    pub at: Timestamp,
    pub y: f64,
}

/// Vertical marker at "now".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowMarker {
    pub at: Timestamp,
    pub y0: f64,
    pub y1: f64,
    pub color: &'static str,
    pub size: u32,
}

/// Everything a renderer needs to draw one timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub view: ViewMode,
    pub now: Timestamp,
    pub window: Window,
    pub interval: TimeInterval,
    pub interval_px: u32,
    pub intervals: u32,
    pub width: u32,
    pub height: u32,
    pub visible_job_count: usize,
    pub bars: Vec<Bar>,
    pub points: Vec<Point>,
    pub grid_lines: Vec<GridLine>,
    pub job_cards: Vec<JobCard>,
    pub axis_lines: Vec<AxisLine>,
    pub job_labels: Vec<JobLabel>,
    pub now_marker: NowMarker,
    /// Indices into `bars` of open executions.
    pub animatable_bar_indices: Vec<usize>,
}

impl Scene {
    pub fn animatable_bars(&self) -> impl Iterator<Item = &Bar> {
        self.animatable_bar_indices.iter().filter_map(|&i| self.bars.get(i))
    }

    pub fn lane_of(&self, job_id: &str) -> Option<usize> {
        self.axis_lines.iter().position(|line| line.job_id == job_id)
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Computes scenes from the scheduler model.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineLayoutEngine {
    geometry: LaneGeometry,
}

impl TimelineLayoutEngine {
    pub fn new(geometry: LaneGeometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &LaneGeometry {
        &self.geometry
    }

    /// Lay out `scheduler` as seen at `now` (scheduler-local wall time).
    pub fn compute(&self, scheduler: &SchedulerAggregate, now: Timestamp, params: &LayoutParams) -> Scene {
        let timer = LayoutMetrics::start(params.view.label());
        let geometry = &self.geometry;

        let intervals = params.intervals();
        let half = i64::from(intervals / 2);
        let anchor = params.interval.truncate(now);
        let window = Window {
            start: saturating_sub(anchor, params.interval.times(half)),
            end: saturating_add(anchor, params.interval.times(half)),
        };

        let mut builder = SceneBuilder {
            geometry,
            params,
            now,
            window,
            bars: Vec::new(),
            points: Vec::new(),
            job_cards: Vec::new(),
            axis_lines: Vec::new(),
            job_labels: Vec::new(),
            animatable: Vec::new(),
            lanes: 0,
        };

        for job in select_jobs(scheduler, params) {
            builder.add_job(job);
        }

        let lanes = builder.lanes;
        let decorated = params.view.decorated();

        // The detail view always reserves exactly one lane.
        let lane_rows = if decorated { lanes } else { 1 };
        let y_max = geometry.lanes_bottom(lane_rows);
        let height = if decorated {
            geometry.top_padding + lanes as u32 * geometry.lane_height + geometry.bottom_padding
        } else {
            geometry.detail_height
        };

        let grid_lines = if decorated {
            build_grid(&window, params.interval, y_max)
        } else {
            Vec::new()
        };

        let inset = f64::from(geometry.now_marker_inset);
        let now_marker = NowMarker {
            at: now,
            y0: inset,
            y1: y_max - inset,
            color: MarkerKind::Running.style().fill,
            size: aesthetics::NOW_MARKER_SIZE,
        };

        let scene = Scene {
            view: params.view.clone(),
            now,
            window,
            interval: params.interval,
            interval_px: params.interval_px,
            intervals,
            width: params.plot_width(),
            height,
            visible_job_count: lanes,
            bars: builder.bars,
            points: builder.points,
            grid_lines,
            job_cards: builder.job_cards,
            axis_lines: builder.axis_lines,
            job_labels: builder.job_labels,
            now_marker,
            animatable_bar_indices: builder.animatable,
        };

        timer.finish(scene.visible_job_count);
        debug!(
            view = params.view.label(),
            lanes = scene.visible_job_count,
            bars = scene.bars.len(),
            points = scene.points.len(),
            animatable = scene.animatable_bar_indices.len(),
            "Timeline scene computed"
        );

        scene
    }
}

/// Candidate jobs in lane order: most recent activity first.
fn select_jobs<'a>(scheduler: &'a SchedulerAggregate, params: &LayoutParams) -> Vec<&'a JobAggregate> {
    let mut jobs: Vec<&JobAggregate> = match &params.view {
        ViewMode::Overview => scheduler
            .jobs
            .values()
            .filter(|job| job.matches(&params.filter))
            .collect(),
        ViewMode::Detail { job_id } => scheduler.job(job_id).into_iter().collect(),
    };
    jobs.sort_by(|a, b| b.stats.last_event_ts.cmp(&a.stats.last_event_ts));
    jobs
}

fn build_grid(window: &Window, interval: TimeInterval, y_max: f64) -> Vec<GridLine> {
    let line = |at, kind, color| GridLine {
        at,
        kind,
        y0: 0.0,
        y1: y_max,
        color,
        width: aesthetics::plot::GRID_WIDTH,
    };

    let mut lines = vec![
        line(window.start, GridLineKind::Border, aesthetics::plot::GRID_COLOR),
        line(window.end, GridLineKind::Border, aesthetics::plot::GRID_COLOR),
    ];

    let mut at = window.start.checked_add_signed(interval.as_duration());
    while let Some(ts) = at.filter(|ts| *ts < window.end) {
        lines.push(line(ts, GridLineKind::Minor, aesthetics::plot::MINOR_BREAKS_COLOR));
        at = ts.checked_add_signed(interval.as_duration());
    }
    lines
}

struct SceneBuilder<'a> {
    geometry: &'a LaneGeometry,
    params: &'a LayoutParams,
    now: Timestamp,
    window: Window,
    bars: Vec<Bar>,
    points: Vec<Point>,
    job_cards: Vec<JobCard>,
    axis_lines: Vec<AxisLine>,
    job_labels: Vec<JobLabel>,
    animatable: Vec<usize>,
    lanes: usize,
}

impl SceneBuilder<'_> {
    fn add_job(&mut self, job: &JobAggregate) {
        let (min_ts, max_ts) = (job.min_ts(), job.max_ts());
        if max_ts < self.window.start || min_ts > self.window.end {
            return;
        }

        let lo = min_ts.max(self.window.start);
        let mut hi = max_ts.min(self.window.end);

        let lane = self.lanes;
        self.lanes += 1;
        let y = self.geometry.lane_y(lane);

        for execution in job.executions.values() {
            if execution.start_ts < lo {
                continue;
            }

            if execution.status == EventKind::JobMissed {
                self.push_point(job, lane, y, execution.end_ts, MarkerKind::Missed);
                continue;
            }

            let animatable = execution.is_open();
            let end = if animatable {
                self.now.max(execution.start_ts)
            } else {
                execution.end_ts
            };

            let style = MarkerKind::for_event(execution.status)
                .unwrap_or(MarkerKind::Submitted)
                .style();

            if animatable {
                self.animatable.push(self.bars.len());
                hi = hi.max(saturating_add(self.now, self.params.interval.as_duration()));
            }

            self.bars.push(Bar {
                job_id: job.id.clone(),
                lane,
                y,
                scheduled_run_time: execution.scheduled_run_time,
                start: execution.start_ts,
                end,
                status: execution.status,
                style,
                animatable,
            });
        }

        let extent = Window { start: lo, end: hi };

        if extent.contains(job.stats.added_ts) {
            self.push_point(job, lane, y, job.stats.added_ts, MarkerKind::Added);
        }

        for event in &job.events {
            if !extent.contains(event.timestamp) {
                continue;
            }
            if let Some(marker) = MarkerKind::for_event(event.kind) {
                self.push_point(job, lane, y, event.timestamp, marker);
            }
        }

        for &next_run in &job.next_run_times {
            if extent.contains(next_run) {
                self.push_point(job, lane, y, next_run, MarkerKind::Scheduled);
            }
        }

        self.axis_lines.push(AxisLine {
            job_id: job.id.clone(),
            x0: lo,
            x1: hi,
            y,
            color: aesthetics::card::AXIS_COLOR,
            width: aesthetics::card::AXIS_WIDTH,
            opacity: aesthetics::card::OPACITY,
        });

        if self.params.view.decorated() {
            let card = self.card(job, lane, lo, hi, y);
            self.job_cards.push(card);
            self.job_labels.push(JobLabel {
                job_id: job.id.clone(),
                text: job.name.clone(),
                at: lo,
                y: y - f64::from(self.geometry.label_offset),
            });
        }
    }

    fn push_point(&mut self, job: &JobAggregate, lane: usize, y: f64, at: Timestamp, marker: MarkerKind) {
        self.points.push(Point {
            job_id: job.id.clone(),
            lane,
            y,
            at,
            marker,
            style: marker.style(),
        });
    }

    fn card(&self, job: &JobAggregate, lane: usize, lo: Timestamp, hi: Timestamp, y: f64) -> JobCard {
        let geometry = self.geometry;
        let padding = self.params.interval.per_pixel(self.params.interval_px) * geometry.card_padding_px as i32;
        let x0 = saturating_sub(lo, padding);
        let x1 = saturating_add(hi, padding);
        let y0 = y - f64::from(geometry.card_above);
        let y1 = y + f64::from(geometry.card_below);

        let x_radius = f64::from(geometry.card_radius_px) * self.params.interval.as_millis() as f64
            / f64::from(self.params.interval_px.max(1));
        let card_height_px = f64::from(geometry.card_above + geometry.card_below);
        let y_radius = f64::from(geometry.card_radius_px) / card_height_px * (y1 - y0);

        JobCard {
            job_id: job.id.clone(),
            lane,
            x0,
            x1,
            y0,
            y1,
            path: rounded_rect_path(epoch_ms(x0), epoch_ms(x1), y0, y1, x_radius, y_radius),
            fill: aesthetics::card::BACKGROUND,
            opacity: aesthetics::card::OPACITY,
        }
    }
}

fn epoch_ms(ts: Timestamp) -> f64 {
    ts.and_utc().timestamp_millis() as f64
}

/// Rectangle with quadratic-curve corners.
fn rounded_rect_path(x0: f64, x1: f64, y0: f64, y1: f64, rx: f64, ry: f64) -> String {
    format!(
        "M {x0} {a} Q {x0} {y0} {b},{y0} L {c},{y0} Q {x1} {y0} {x1} {a} \
         L {x1} {d} Q {x1} {y1} {c},{y1} L {b},{y1} Q {x0} {y1} {x0} {d} Z",
        a = y0 + ry,
        b = x0 + rx,
        c = x1 - rx,
        d = y1 - ry,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals_respect_floor_and_parity() {
        let params = LayoutParams::overview(1300, TimeInterval::HOUR);
        // (1300 - 120) / 60 = 19.67 -> 19 -> 20
        assert_eq!(params.intervals(), 20);
        assert_eq!(params.plot_width(), 22 * 60);

        let narrow = LayoutParams::overview(300, TimeInterval::HOUR);
        assert_eq!(narrow.intervals(), 12);

        let tiny = LayoutParams::overview(10, TimeInterval::HOUR).with_min_intervals(5);
        assert_eq!(tiny.intervals(), 6);
    }

    #[test]
    fn test_rounded_rect_path_shape() {
        let path = rounded_rect_path(0.0, 100.0, 10.0, 80.0, 5.0, 5.0);
        assert!(path.starts_with("M 0 15 Q 0 10 5,10 L 95,10"));
        assert!(path.ends_with("Q 0 80 0 75 Z"));
    }
}
