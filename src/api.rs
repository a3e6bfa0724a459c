use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::activity::DeliveryRecord;
use crate::delivery::{DeliveryLoop, LoopStatus, TickReport};
use crate::error::ValidationError;
use crate::store::{ConfigUpdate, Configuration};

pub const DEFAULT_ACTIVITY_LIMIT: usize = 10;
pub const MAX_ACTIVITY_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub delivery: Arc<DeliveryLoop>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/config", get(get_config).put(update_config).post(update_config))
        .route("/api/activity", get(get_activity).delete(clear_activity))
        .route("/api/status", get(get_status))
        .route("/api/bot/start", post(start_bot))
        .route("/api/bot/stop", post(stop_bot))
        .route("/api/bot/tick", post(run_tick))
        .route("/api/test-message", post(test_message))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Error body: `{"error": "...", "field": "..."}`.
///
/// A body that does not deserialize reports `"field": "body"`.
pub enum ApiError {
    Validation(ValidationError),
    Body(JsonRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, field) = match self {
            ApiError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), e.field),
            ApiError::Body(r) => (r.status(), r.body_text(), "body"),
        };
        let body = serde_json::json!({ "error": error, "field": field });
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Body(r)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

async fn get_config(State(state): State<AppState>) -> Json<Configuration> {
    Json(state.delivery.store().get())
}

async fn update_config(
    State(state): State<AppState>,
    body: Result<Json<ConfigUpdate>, JsonRejection>,
) -> Result<Json<Configuration>, ApiError> {
    let Json(body) = body.inspect_err(|r| {
        tracing::warn!(error = %r.body_text(), "unreadable configuration update");
    })?;
    let before = state.delivery.store().get().interval_minutes;
    let cfg = state.delivery.store().update(&body).map_err(|e| {
        tracing::warn!(field = e.field, error = %e, "rejected configuration update");
        e
    })?;
    if cfg.interval_minutes != before {
        state.delivery.reschedule();
    }
    Ok(Json(cfg))
}

#[derive(serde::Deserialize)]
struct ActivityQuery {
    #[serde(default)]
    limit: Option<usize>,
}

async fn get_activity(
    State(state): State<AppState>,
    Query(q): Query<ActivityQuery>,
) -> Json<Vec<DeliveryRecord>> {
    let n = q
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    Json(state.delivery.activity().snapshot_last_n(n))
}

#[derive(serde::Serialize)]
struct Cleared {
    cleared: usize,
}

async fn clear_activity(State(state): State<AppState>) -> Json<Cleared> {
    let cleared = state.delivery.activity().clear();
    tracing::info!(cleared, "activity log cleared");
    Json(Cleared { cleared })
}

async fn get_status(State(state): State<AppState>) -> Json<LoopStatus> {
    Json(state.delivery.status())
}

#[derive(serde::Serialize)]
struct ControlOut {
    running: bool,
    changed: bool,
}

async fn start_bot(State(state): State<AppState>) -> Json<ControlOut> {
    let changed = state.delivery.start();
    Json(ControlOut {
        running: true,
        changed,
    })
}

async fn stop_bot(State(state): State<AppState>) -> Json<ControlOut> {
    let changed = state.delivery.stop();
    Json(ControlOut {
        running: false,
        changed,
    })
}

async fn run_tick(State(state): State<AppState>) -> (StatusCode, Json<TickReport>) {
    let report = state.delivery.run_tick().await;
    let code = match report {
        TickReport::Skipped => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    (code, Json(report))
}

async fn test_message(State(state): State<AppState>) -> Json<DeliveryRecord> {
    Json(state.delivery.send_test_message().await)
}
