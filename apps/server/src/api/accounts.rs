//! Linked account endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use stepsync_core::accounts::{LinkedAccount, NewLinkedAccount};
use stepsync_core::sync::SyncRunRecord;
use stepsync_oneself::sync_callback_url;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

const DEFAULT_RUNS_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAccountRequest {
    pub id: Option<String>,
    pub user_name: String,
    pub refresh_token: String,
    /// Existing stream. When absent a stream is registered with 1self.
    pub stream_id: Option<String>,
    pub write_token: Option<String>,
    pub read_token: Option<String>,
    pub registration_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    #[serde(flatten)]
    pub account: LinkedAccount,
    pub visualization_url: String,
}

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<i64>,
}

fn account_response(state: &AppState, account: LinkedAccount) -> AccountResponse {
    AccountResponse {
        visualization_url: state.oneself.visualization_url(&account.stream_id),
        account,
    }
}

async fn link_account(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LinkAccountRequest>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    let account_id = request
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let (stream_id, write_token, read_token) = match (request.stream_id, request.write_token) {
        (Some(stream_id), Some(write_token)) => (stream_id, write_token, request.read_token),
        (Some(_), None) => {
            return Err(ApiError::BadRequest(
                "writeToken is required with streamId".to_string(),
            ))
        }
        (None, _) => {
            let registration_token = request.registration_token.ok_or_else(|| {
                ApiError::BadRequest(
                    "registrationToken is required to register a new stream".to_string(),
                )
            })?;
            let callback_url = sync_callback_url(&state.public_host, &account_id);
            let stream = state
                .oneself
                .register_stream(&registration_token, &request.user_name, &callback_url)
                .await?;
            (stream.id, stream.write_token, stream.read_token)
        }
    };

    let account = state
        .account_service
        .link_account(NewLinkedAccount {
            id: Some(account_id),
            user_name: request.user_name,
            refresh_token: request.refresh_token,
            stream_id,
            write_token,
            read_token,
        })
        .await?;

    // First data shows up right after linking; a failed attempt is retried by the scheduler.
    match state.sync_service.sync_account(&account.id).await {
        Ok(report) => info!(
            "Initial sync for account {} finished in state {}",
            account.id,
            report.state.as_str()
        ),
        Err(err) => warn!("Initial sync for account {} not run: {}", account.id, err),
    }

    Ok((StatusCode::CREATED, Json(account_response(&state, account))))
}

async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<AccountResponse>>> {
    let accounts = state.account_service.list_accounts()?;
    Ok(Json(
        accounts
            .into_iter()
            .map(|account| account_response(&state, account))
            .collect(),
    ))
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<Json<AccountResponse>> {
    let account = state.account_service.get_account(&account_id)?;
    Ok(Json(account_response(&state, account)))
}

async fn unlink_account(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.account_service.unlink_account(&account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_runs(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    Query(query): Query<RunsQuery>,
) -> ApiResult<Json<Vec<SyncRunRecord>>> {
    state.account_service.get_account(&account_id)?;
    let runs = state
        .sync_service
        .recent_runs(&account_id, query.limit.unwrap_or(DEFAULT_RUNS_LIMIT))?;
    Ok(Json(runs))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts", get(list_accounts).post(link_account))
        .route("/accounts/:id", get(get_account).delete(unlink_account))
        .route("/accounts/:id/runs", get(list_runs))
}
