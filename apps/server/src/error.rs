use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use stepsync_core::errors::{DatabaseError, Error};
use stepsync_core::sync::SyncServiceError;
use stepsync_oneself::OneselfError;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Upstream or downstream service failure.
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(message) => ApiError::NotFound(message),
            Error::InvalidInput(message) => ApiError::BadRequest(message),
            Error::Database(DatabaseError::QueryFailed(message))
                if message.contains("UNIQUE constraint failed") =>
            {
                ApiError::Conflict("Account already exists".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SyncServiceError> for ApiError {
    fn from(err: SyncServiceError) -> Self {
        match err {
            SyncServiceError::AlreadyRunning(_) => ApiError::Conflict(err.to_string()),
            SyncServiceError::Core(inner) => inner.into(),
        }
    }
}

impl From<OneselfError> for ApiError {
    fn from(err: OneselfError) -> Self {
        match err {
            OneselfError::InvalidRequest(message) => ApiError::BadRequest(message),
            other => ApiError::BadGateway(format!("1self request failed: {}", other)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("API error ({}): {}", status, self);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
