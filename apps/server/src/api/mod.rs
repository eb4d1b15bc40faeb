mod accounts;
mod scheduler;
mod sync;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::main_lib::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(accounts::router())
        .merge(sync::router())
        .merge(scheduler::router())
        .with_state(state)
}
