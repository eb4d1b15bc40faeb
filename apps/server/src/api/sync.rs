//! Sync trigger invoked by 1self through the registered callback URL.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use stepsync_core::sync::SyncReport;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQuery {
    pub uid: String,
    pub streamid: Option<String>,
    /// Echoed by 1self; the stored cursor is authoritative.
    pub latest_sync_field: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub report: SyncReport,
    pub visualization_url: String,
}

fn write_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SyncQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<SyncResponse>> {
    let account = state.account_service.get_account(&query.uid)?;

    if let Some(stream_id) = query.streamid.as_deref() {
        if stream_id != account.stream_id {
            return Err(ApiError::BadRequest(format!(
                "Stream {} does not belong to account {}",
                stream_id, account.id
            )));
        }
    }
    let token = write_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing stream write token".to_string()))?;
    if !account.accepts_write_token(token) {
        return Err(ApiError::Unauthorized("Invalid stream write token".to_string()));
    }

    debug!(
        "Sync requested for account {} (latestSyncField={:?})",
        account.id, query.latest_sync_field
    );
    let report = state.sync_service.sync_account(&account.id).await?;
    info!(
        "Sync for account {} finished in state {}",
        account.id,
        report.state.as_str()
    );

    Ok(Json(SyncResponse {
        report,
        visualization_url: state.oneself.visualization_url(&account.stream_id),
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/sync", post(trigger_sync))
}
