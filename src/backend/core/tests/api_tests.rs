//! Tests for the HTTP API.
//!
//! Tests cover:
//! - Health check and session status
//! - Scheduler and job endpoints
//! - Overview and detail timelines
//! - Error responses
//! - Live view endpoints

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use jobscope_core::api::{build_router, ApiResponse, AppState};
use jobscope_core::clock::FixedClock;
use jobscope_core::config::ViewConfig;
use jobscope_core::error::{ErrorCode, JobscopeError};
use jobscope_core::ingest::ModelStore;
use jobscope_core::model::{JobProperties, RawEvent, Snapshot};
use jobscope_core::timeline::{LayoutParams, TimeInterval, TimelineLayoutEngine};
use jobscope_core::view::LiveView;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn populated_store() -> ModelStore {
    let store = ModelStore::new();
    store.initialize(&Snapshot::default());
    for event in [
        RawEvent::new("scheduler_started", "2024-03-01 09:00:00"),
        RawEvent::new("job_added", "2024-03-01 10:00:00")
            .for_job("sync")
            .with_properties(JobProperties::new("sync", "Sync inventory")),
        RawEvent::new("job_added", "2024-03-01 10:00:00")
            .for_job("mail")
            .with_properties(JobProperties::new("mail", "Send digest")),
        RawEvent::new("job_submitted", "2024-03-01 10:20:00")
            .for_job("sync")
            .with_scheduled_run_time("2024-03-01 10:20:00"),
    ] {
        store.apply(&event);
    }
    store
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 10, 25, 0).unwrap()))
}

fn app(store: ModelStore) -> Router {
    build_router(AppState::new(store).with_clock(clock()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ============================================================================
// ApiResponse Tests
// ============================================================================

#[test]
fn test_api_response_serialization_omits_empty_fields() {
    let json = serde_json::to_value(ApiResponse::success(serde_json::json!({"key": "value"}))).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["key"], "value");
    assert!(json.get("error").is_none());
    assert!(json.get("error_code").is_none());
}

#[test]
fn test_api_response_from_error() {
    let response = ApiResponse::<()>::from_error(&JobscopeError::not_initialized());
    assert!(!response.success);
    assert_eq!(response.error_code, Some(ErrorCode::SessionNotInitialized.to_string()));
}

// ============================================================================
// Health & Scheduler
// ============================================================================

#[tokio::test]
async fn test_health_reports_session_state() {
    let (status, body) = get(app(ModelStore::new()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["session_initialized"], false);
}

#[tokio::test]
async fn test_scheduler_before_snapshot_is_unavailable() {
    let (status, body) = get(app(ModelStore::new()), "/api/scheduler").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "SESSION_NOT_INITIALIZED");
}

#[tokio::test]
async fn test_scheduler_summary() {
    let (status, body) = get(app(populated_store()), "/api/scheduler").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "running");
    assert_eq!(body["data"]["job_count"], 2);
    assert_eq!(body["data"]["active_job_count"], 2);
}

// ============================================================================
// Jobs
// ============================================================================

#[tokio::test]
async fn test_list_jobs_with_filter() {
    let (_, all) = get(app(populated_store()), "/api/jobs").await;
    let jobs = all["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    // Most recently active first.
    assert_eq!(jobs[0]["id"], "sync");
    assert_eq!(jobs[0]["running"], 1);

    let (_, filtered) = get(app(populated_store()), "/api/jobs?filter=digest").await;
    let jobs = filtered["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], "mail");
}

#[tokio::test]
async fn test_get_job_with_history() {
    let (status, body) = get(app(populated_store()), "/api/jobs/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["job"]["name"], "Sync inventory");
    assert_eq!(body["data"]["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let (status, body) = get(app(populated_store()), "/api/jobs/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "JOB_NOT_FOUND");
}

// ============================================================================
// Timelines
// ============================================================================

#[tokio::test]
async fn test_overview_timeline() {
    let (status, body) = get(app(populated_store()), "/api/timeline?width=1300&interval=hour").await;
    assert_eq!(status, StatusCode::OK);
    let scene = &body["data"]["scene"];
    assert_eq!(scene["visible_job_count"], 2);
    assert_eq!(scene["intervals"], 20);
    assert_eq!(scene["animatable_bar_indices"].as_array().unwrap().len(), 1);
    assert!(body["data"].get("animation").is_none());
}

#[tokio::test]
async fn test_overview_timeline_with_frames() {
    let (_, body) = get(
        app(populated_store()),
        "/api/timeline?interval=minute&filter=sync&frames=true",
    )
    .await;
    assert_eq!(body["data"]["scene"]["visible_job_count"], 1);
    assert_eq!(body["data"]["animation"]["frames"].as_array().unwrap().len(), 59);
}

#[tokio::test]
async fn test_timeline_rejects_bad_parameters() {
    let (status, body) = get(app(populated_store()), "/api/timeline?interval=fortnight").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_INTERVAL");

    let (status, body) = get(app(populated_store()), "/api/timeline?width=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_VIEWPORT");
}

#[tokio::test]
async fn test_timeline_rejects_oversized_parameters() {
    let (status, body) = get(
        app(populated_store()),
        "/api/timeline?interval=10000000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_INTERVAL");

    let (status, body) = get(app(populated_store()), "/api/timeline?width=4000000000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_VIEWPORT");

    let (status, body) = get(
        app(populated_store()),
        "/api/timeline?width=20000&interval=31536000000&frames=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["scene"]["visible_job_count"], 2);
}

#[tokio::test]
async fn test_job_detail_timeline() {
    let (status, body) = get(app(populated_store()), "/api/jobs/sync/timeline").await;
    assert_eq!(status, StatusCode::OK);
    let scene = &body["data"]["scene"];
    assert_eq!(scene["view"]["view"], "detail");
    assert_eq!(scene["height"], 70);
    assert_eq!(scene["visible_job_count"], 1);

    let (status, _) = get(app(populated_store()), "/api/jobs/ghost/timeline").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Live View
// ============================================================================

#[tokio::test]
async fn test_live_frame_without_live_view() {
    let (status, body) = get(app(populated_store()), "/api/timeline/live").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error_code"], "STREAM_CLOSED");
}

#[tokio::test]
async fn test_live_command_rejects_oversized_width() {
    let response = app(populated_store())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/timeline/live")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"command": "resize", "width": 4000000000}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error_code"], "INVALID_VIEWPORT");
}

#[tokio::test]
async fn test_live_frame_and_command() {
    let store = populated_store();
    let view = LiveView::new(
        store.clone(),
        TimelineLayoutEngine::default(),
        clock(),
        ViewConfig::default(),
        LayoutParams::overview(1300, TimeInterval::HOUR),
    )
    .spawn(CancellationToken::new());
    let client = view.client();

    let mut frames = client.subscribe();
    frames.wait_for(|frame| frame.is_some()).await.unwrap();

    let router = build_router(AppState::new(store).with_clock(clock()).with_live_view(client));

    let (status, body) = get(router.clone(), "/api/timeline/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["generation"], 1);
    assert_eq!(body["data"]["scene"]["visible_job_count"], 2);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/timeline/live")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"command": "filter", "text": "mail"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let frame = frames
        .wait_for(|frame| frame.as_ref().is_some_and(|f| f.generation >= 2))
        .await
        .unwrap()
        .clone()
        .unwrap();
    assert_eq!(frame.scene.visible_job_count, 1);

    view.shutdown().await;
}
