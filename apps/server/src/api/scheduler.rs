use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::ApiResult;
use crate::main_lib::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatusResponse {
    pub status: String,
    pub running: bool,
    pub interval_secs: u64,
}

async fn status_response(state: &AppState, status: &str) -> SchedulerStatusResponse {
    SchedulerStatusResponse {
        status: status.to_string(),
        running: state.scheduler.is_running().await,
        interval_secs: state.scheduler.interval().as_secs(),
    }
}

async fn start_scheduler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SchedulerStatusResponse>> {
    state.scheduler.start().await;
    Ok(Json(status_response(&state, "started").await))
}

async fn stop_scheduler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SchedulerStatusResponse>> {
    state.scheduler.stop().await;
    Ok(Json(status_response(&state, "stopped").await))
}

async fn scheduler_status(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SchedulerStatusResponse>> {
    let running = state.scheduler.is_running().await;
    let status = if running { "running" } else { "stopped" };
    Ok(Json(status_response(&state, status).await))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scheduler/start", post(start_scheduler))
        .route("/scheduler/stop", post(stop_scheduler))
        .route("/scheduler/status", get(scheduler_status))
}
