//! API request handlers.
//!
//! All handlers return `Result<impl IntoResponse, JobscopeError>` so that
//! errors become HTTP status codes through `JobscopeError`'s `IntoResponse`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiResponse, AppState};
use crate::error::{ErrorCode, JobscopeError};
use crate::model::{
    EventKind, JobAggregate, RunState, SchedulerAggregate, SchedulerDefaults, SchedulerEvent, Timestamp,
};
use crate::timeline::{AnimationClock, LayoutParams, Scene, TimeInterval};
use crate::view::{LiveFrame, ViewCommand};

// ═══════════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "session_initialized": state.store.is_initialized(),
        "revision": state.store.revision(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Scheduler & Jobs
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct SchedulerSummary {
    pub session_id: Uuid,
    pub class_name: String,
    pub state: RunState,
    pub timezone: String,
    pub defaults: SchedulerDefaults,
    pub executors: Vec<String>,
    pub jobstores: Vec<String>,
    pub job_count: usize,
    pub active_job_count: usize,
    pub version: u64,
}

impl From<&SchedulerAggregate> for SchedulerSummary {
    fn from(scheduler: &SchedulerAggregate) -> Self {
        Self {
            session_id: scheduler.session_id,
            class_name: scheduler.class_name.clone(),
            state: scheduler.state,
            timezone: scheduler.timezone.clone(),
            defaults: scheduler.defaults.clone(),
            executors: scheduler.executors.keys().cloned().collect(),
            jobstores: scheduler.jobstores.keys().cloned().collect(),
            job_count: scheduler.jobs.len(),
            active_job_count: scheduler.active_job_count(),
            version: scheduler.version,
        }
    }
}

pub async fn get_scheduler(State(state): State<AppState>) -> Result<impl IntoResponse, JobscopeError> {
    let summary = state.store.read(|scheduler| SchedulerSummary::from(scheduler))?;
    Ok(Json(ApiResponse::success(summary)))
}

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub name: String,
    pub trigger: Option<String>,
    pub status: Option<EventKind>,
    pub next_run_time: Option<Timestamp>,
    pub last_event_ts: Option<Timestamp>,
    pub removed: bool,
    pub executions: usize,
    pub running: usize,
}

impl From<&JobAggregate> for JobSummary {
    fn from(job: &JobAggregate) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            trigger: job.config.trigger.clone(),
            status: job.stats.current_status,
            next_run_time: job.next_run_times.first().copied(),
            last_event_ts: job.stats.last_event_ts,
            removed: job.is_removed(),
            executions: job.executions.len(),
            running: job.open_executions().count(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    #[serde(default)]
    pub filter: String,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<impl IntoResponse, JobscopeError> {
    let jobs: Vec<JobSummary> = state.store.read(|scheduler| {
        scheduler
            .matching_jobs(&query.filter)
            .map(JobSummary::from)
            .collect()
    })?;
    Ok(Json(ApiResponse::success(jobs)))
}

/// A job with its full event history.
#[derive(Debug, Serialize)]
pub struct JobDetail {
    pub job: JobAggregate,
    pub history: Vec<SchedulerEvent>,
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, JobscopeError> {
    let detail = state
        .store
        .read(|scheduler| {
            scheduler.job(&id).map(|job| JobDetail {
                job: job.clone(),
                history: job.all_events().into_iter().cloned().collect(),
            })
        })?
        .ok_or_else(|| JobscopeError::job_not_found(&id))?;
    Ok(Json(ApiResponse::success(detail)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Timelines
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct TimelineQuery {
    pub width: Option<u32>,
    /// `hour`, `minute`, `second`, `day` or milliseconds
    pub interval: Option<String>,
    pub filter: Option<String>,
    /// Include the animation frames
    #[serde(default)]
    pub frames: bool,
}

impl TimelineQuery {
    fn width(&self, default: u32) -> Result<u32, JobscopeError> {
        self.width.map_or(Ok(default), LayoutParams::checked_width)
    }

    fn interval(&self, default: TimeInterval) -> Result<TimeInterval, JobscopeError> {
        match self.interval.as_deref() {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|err| {
                JobscopeError::with_internal(ErrorCode::InvalidInterval, "Invalid interval", format!("{err}"))
                    .with_context("interval", raw)
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    pub scene: Scene,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<AnimationClock>,
}

impl TimelineResponse {
    fn new(scene: Scene, frames: bool) -> Self {
        let animation = frames.then(|| AnimationClock::new(&scene, 0));
        Self { scene, animation }
    }
}

pub async fn overview_timeline(
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> Result<impl IntoResponse, JobscopeError> {
    let config = &state.timeline;
    let params = LayoutParams::overview(
        query.width(config.default_width)?,
        query.interval(config.default_interval)?,
    )
    .with_interval_px(config.interval_px)
    .with_min_intervals(config.min_intervals)
    .with_filter(query.filter.clone().unwrap_or_default());

    let scene = state.store.read(|scheduler| {
        let now = state.clock.now_in(&scheduler.tz());
        state.engine.compute(scheduler, now, &params)
    })?;
    Ok(Json(ApiResponse::success(TimelineResponse::new(scene, query.frames))))
}

pub async fn job_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Result<impl IntoResponse, JobscopeError> {
    let width = query.width(state.timeline.default_width)?;
    let scene = state
        .store
        .read(|scheduler| {
            scheduler.job(&id).map(|job| {
                let params = LayoutParams::detail(job, width).with_interval_px(state.timeline.interval_px);
                let now = state.clock.now_in(&scheduler.tz());
                state.engine.compute(scheduler, now, &params)
            })
        })?
        .ok_or_else(|| JobscopeError::job_not_found(&id))?;
    Ok(Json(ApiResponse::success(TimelineResponse::new(scene, query.frames))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Live View
// ═══════════════════════════════════════════════════════════════════════════════

fn live_unavailable() -> JobscopeError {
    JobscopeError::new(ErrorCode::StreamClosed, "Live view is not running")
}

pub async fn live_frame(State(state): State<AppState>) -> Result<impl IntoResponse, JobscopeError> {
    let live = state.live.as_ref().ok_or_else(live_unavailable)?;
    let frame: std::sync::Arc<LiveFrame> = live.latest().ok_or_else(JobscopeError::not_initialized)?;
    Ok(Json(ApiResponse::success(frame)))
}

pub async fn live_command(
    State(state): State<AppState>,
    Json(command): Json<ViewCommand>,
) -> Result<impl IntoResponse, JobscopeError> {
    command.validate()?;
    let live = state.live.as_ref().ok_or_else(live_unavailable)?;
    live.send(command.clone()).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(serde_json::json!({ "accepted": command }))),
    ))
}
