use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{Error, Result};
use crate::sync::{Credential, StreamDestination, SyncCursor};

/// A user whose step data is synced from the upstream source to a downstream stream.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub id: String,
    pub user_name: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub stream_id: String,
    #[serde(skip_serializing)]
    pub write_token: String,
    pub read_token: Option<String>,
    pub last_processed_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LinkedAccount {
    pub fn credential(&self) -> Credential {
        Credential {
            refresh_token: self.refresh_token.clone(),
            access_token: self.access_token.clone(),
        }
    }

    pub fn destination(&self) -> StreamDestination {
        StreamDestination {
            stream_id: self.stream_id.clone(),
            write_token: self.write_token.clone(),
        }
    }

    pub fn cursor(&self) -> SyncCursor {
        SyncCursor::new(self.last_processed_time)
    }

    /// True when `write_token` is the token this account writes its stream with.
    pub fn accepts_write_token(&self, write_token: &str) -> bool {
        !write_token.is_empty() && self.write_token == write_token
    }
}

impl fmt::Debug for LinkedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedAccount")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("stream_id", &self.stream_id)
            .field("last_processed_time", &self.last_processed_time)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// Input for linking a new account. The stream must already exist.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLinkedAccount {
    pub id: Option<String>,
    pub user_name: String,
    pub refresh_token: String,
    pub stream_id: String,
    pub write_token: String,
    pub read_token: Option<String>,
}

impl NewLinkedAccount {
    pub fn validate(&self) -> Result<()> {
        if self.user_name.trim().is_empty() {
            return Err(Error::InvalidInput("user name is required".to_string()));
        }
        if self.refresh_token.trim().is_empty() {
            return Err(Error::InvalidInput("refresh token is required".to_string()));
        }
        if self.stream_id.trim().is_empty() || self.write_token.trim().is_empty() {
            return Err(Error::InvalidInput(
                "stream id and write token are required".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for NewLinkedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewLinkedAccount")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("stream_id", &self.stream_id)
            .finish_non_exhaustive()
    }
}

/// Tokens returned by an upstream refresh. `refresh_token` is set only when rotated.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenUpdate {
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
}

impl fmt::Debug for TokenUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenUpdate")
            .field("rotates_refresh_token", &self.refresh_token.is_some())
            .field("has_access_token", &self.access_token.is_some())
            .finish()
    }
}
