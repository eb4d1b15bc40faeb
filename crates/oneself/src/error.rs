//! Error types for the 1self client.

use stepsync_core::errors::SinkError;
use stepsync_core::sync::{retry_class_for_status, SyncRetryClass};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OneselfError>;

#[derive(Debug, Error)]
pub enum OneselfError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the 1self API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or malformed write token / app credentials
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl OneselfError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Api { status, .. } => retry_class_for_status(*status),
            Self::Http(_) => SyncRetryClass::Retryable,
            Self::Json(_) | Self::InvalidRequest(_) => SyncRetryClass::Permanent,
            Self::Auth(_) => SyncRetryClass::ReauthRequired,
        }
    }
}

impl From<OneselfError> for SinkError {
    fn from(err: OneselfError) -> Self {
        match err {
            OneselfError::Api { status, message } => SinkError::Rejected { status, message },
            OneselfError::Http(e) => SinkError::Transport(e.to_string()),
            OneselfError::Json(e) => SinkError::InvalidPayload(e.to_string()),
            OneselfError::InvalidRequest(message) => SinkError::InvalidPayload(message),
            OneselfError::Auth(message) => SinkError::Rejected {
                status: 401,
                message,
            },
        }
    }
}
