//! Database model for the sync run history.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use stepsync_core::sync::{SyncCursor, SyncErrorKind, SyncRunRecord, SyncState};

use crate::errors::StorageError;
use crate::timestamps::{format_timestamp, parse_timestamp};

#[derive(
    Queryable, Identifiable, Insertable, Selectable, Debug, Clone, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::sync_runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncRunDB {
    pub id: String,
    pub account_id: String,
    pub state: String,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub cursor_before_nanos: i64,
    pub cursor_after_nanos: i64,
    pub bucket_count: i64,
    pub total_steps: i64,
    pub started_at: String,
    pub duration_ms: i64,
}

impl From<SyncRunRecord> for SyncRunDB {
    fn from(record: SyncRunRecord) -> Self {
        Self {
            id: record.id,
            account_id: record.account_id,
            state: record.state.as_str().to_string(),
            error_kind: record.error_kind.map(|kind| kind.as_str().to_string()),
            error_message: record.error_message,
            cursor_before_nanos: record.cursor_before.as_nanos(),
            cursor_after_nanos: record.cursor_after.as_nanos(),
            bucket_count: record.bucket_count,
            total_steps: record.total_steps,
            started_at: format_timestamp(record.started_at),
            duration_ms: record.duration_ms,
        }
    }
}

impl TryFrom<SyncRunDB> for SyncRunRecord {
    type Error = StorageError;

    fn try_from(db: SyncRunDB) -> Result<Self, Self::Error> {
        let state = db
            .state
            .parse::<SyncState>()
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        let error_kind = db
            .error_kind
            .as_deref()
            .map(str::parse::<SyncErrorKind>)
            .transpose()
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;

        Ok(SyncRunRecord {
            started_at: parse_timestamp(&db.started_at)?,
            id: db.id,
            account_id: db.account_id,
            state,
            error_kind,
            error_message: db.error_message,
            cursor_before: SyncCursor::from_nanos(db.cursor_before_nanos),
            cursor_after: SyncCursor::from_nanos(db.cursor_after_nanos),
            bucket_count: db.bucket_count,
            total_steps: db.total_steps,
            duration_ms: db.duration_ms,
        })
    }
}
