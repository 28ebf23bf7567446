//! Read-only HTTP API over the scheduler model and its timelines.
//!
//! # Routes
//!
//! - `GET /health`, `GET /metrics`
//! - `GET /api/scheduler`
//! - `GET /api/jobs?filter=`, `GET /api/jobs/{id}`
//! - `GET /api/timeline?width=&interval=&filter=&frames=`
//! - `GET /api/jobs/{id}/timeline?width=&frames=`
//! - `GET /api/timeline/live`, `POST /api/timeline/live` (view parameters only)
//! - `GET /api/timeline/live/ws`: live frames over a WebSocket

mod handlers;
mod websocket;

use axum::{
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::clock::{Clock, SystemClock};
use crate::config::TimelineConfig;
use crate::error::JobscopeError;
use crate::ingest::ModelStore;
use crate::telemetry::MetricsRegistry;
use crate::timeline::TimelineLayoutEngine;
use crate::view::LiveViewClient;

pub use handlers::{JobDetail, JobSummary, SchedulerSummary, TimelineQuery, TimelineResponse};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: ModelStore,
    pub engine: TimelineLayoutEngine,
    pub clock: Arc<dyn Clock>,
    pub metrics: MetricsRegistry,
    pub timeline: TimelineConfig,
    pub live: Option<LiveViewClient>,
}

impl AppState {
    /// State over `store` with the system clock and default settings.
    pub fn new(store: ModelStore) -> Self {
        let timeline = TimelineConfig::default();
        Self {
            store,
            engine: TimelineLayoutEngine::new(timeline.geometry),
            clock: Arc::new(SystemClock),
            metrics: MetricsRegistry::disabled(),
            timeline,
            live: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_timeline(mut self, timeline: TimelineConfig) -> Self {
        self.engine = TimelineLayoutEngine::new(timeline.geometry);
        self.timeline = timeline;
        self
    }

    pub fn with_live_view(mut self, live: LiveViewClient) -> Self {
        self.live = Some(live);
        self
    }
}

/// Build the API router.
///
/// # Example
///
/// ```rust,ignore
/// let state = AppState::new(store).with_live_view(view.client());
/// let app = build_router(state);
/// ```
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/api/scheduler", get(handlers::get_scheduler))
        .route("/api/jobs", get(handlers::list_jobs))
        .route("/api/jobs/:id", get(handlers::get_job))
        .route("/api/jobs/:id/timeline", get(handlers::job_timeline))
        .route("/api/timeline", get(handlers::overview_timeline))
        .route(
            "/api/timeline/live",
            get(handlers::live_frame).post(handlers::live_command),
        )
        .route("/api/timeline/live/ws", get(websocket::live_ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_code: None,
        }
    }

    pub fn from_error(err: &JobscopeError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.user_message().to_string()),
            error_code: Some(err.code().to_string()),
        }
    }
}
