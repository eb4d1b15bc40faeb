//! Error types for the Google Fit client.

use stepsync_core::errors::FetchError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GoogleFitError>;

#[derive(Debug, Error)]
pub enum GoogleFitError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the Fitness API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The token endpoint refused the refresh token
    #[error("Authorization rejected: {0}")]
    Unauthorized(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GoogleFitError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<GoogleFitError> for FetchError {
    fn from(err: GoogleFitError) -> Self {
        match err {
            GoogleFitError::Unauthorized(message) => FetchError::Unauthorized(message),
            GoogleFitError::Api { status, message } if matches!(status, 401 | 403) => {
                FetchError::Unauthorized(format!("({}) {}", status, message))
            }
            GoogleFitError::Api { status, message } => FetchError::Api { status, message },
            GoogleFitError::Http(e) if e.is_timeout() => FetchError::Timeout(e.to_string()),
            GoogleFitError::Http(e) if e.is_decode() => FetchError::Malformed(e.to_string()),
            GoogleFitError::Http(e) => FetchError::Transport(e.to_string()),
            GoogleFitError::Json(e) => FetchError::Malformed(e.to_string()),
            GoogleFitError::InvalidResponse(message) => FetchError::Malformed(message),
        }
    }
}
