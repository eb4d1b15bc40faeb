//! Database models for linked accounts.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use stepsync_core::accounts::{LinkedAccount, NewLinkedAccount};
use stepsync_core::sync::SyncCursor;

use crate::errors::StorageError;
use crate::timestamps::{format_timestamp, parse_timestamp};

#[derive(Queryable, Identifiable, Insertable, Selectable, Clone)]
#[diesel(table_name = crate::schema::linked_accounts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LinkedAccountDB {
    pub id: String,
    pub user_name: String,
    pub refresh_token: String,
    pub access_token: Option<String>,
    pub stream_id: String,
    pub write_token: String,
    pub read_token: Option<String>,
    pub last_processed_nanos: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl LinkedAccountDB {
    /// Row for a freshly linked account; the cursor starts at the epoch.
    pub fn from_new(new_account: NewLinkedAccount, id: String, now: DateTime<Utc>) -> Self {
        let now = format_timestamp(now);
        Self {
            id,
            user_name: new_account.user_name.trim().to_string(),
            refresh_token: new_account.refresh_token,
            access_token: None,
            stream_id: new_account.stream_id,
            write_token: new_account.write_token,
            read_token: new_account.read_token,
            last_processed_nanos: SyncCursor::epoch().as_nanos(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

impl TryFrom<LinkedAccountDB> for LinkedAccount {
    type Error = StorageError;

    fn try_from(db: LinkedAccountDB) -> Result<Self, Self::Error> {
        Ok(LinkedAccount {
            last_processed_time: SyncCursor::from_nanos(db.last_processed_nanos)
                .last_processed_time,
            created_at: parse_timestamp(&db.created_at)?,
            updated_at: parse_timestamp(&db.updated_at)?,
            id: db.id,
            user_name: db.user_name,
            refresh_token: db.refresh_token,
            access_token: db.access_token,
            stream_id: db.stream_id,
            write_token: db.write_token,
            read_token: db.read_token,
        })
    }
}

/// Token columns touched by a refresh. `None` leaves the column as is.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::linked_accounts)]
pub struct TokenChangesetDB {
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub updated_at: String,
}
