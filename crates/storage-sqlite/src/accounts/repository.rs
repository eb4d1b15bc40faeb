use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::debug;
use std::sync::Arc;
use uuid::Uuid;

use stepsync_core::accounts::{AccountRepositoryTrait, LinkedAccount, NewLinkedAccount, TokenUpdate};
use stepsync_core::errors::{Error, Result};
use stepsync_core::sync::{CursorStore, SyncCursor};

use super::model::{LinkedAccountDB, TokenChangesetDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::linked_accounts;
use crate::schema::linked_accounts::dsl::*;
use crate::timestamps::format_timestamp;

pub struct AccountRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

fn not_found(account_id: &str) -> Error {
    Error::NotFound(format!("Linked account {} not found", account_id))
}

fn load_account(conn: &mut SqliteConnection, account_id: &str) -> Result<LinkedAccount> {
    let row = linked_accounts
        .find(account_id)
        .select(LinkedAccountDB::as_select())
        .first::<LinkedAccountDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .ok_or_else(|| not_found(account_id))?;
    Ok(LinkedAccount::try_from(row)?)
}

impl AccountRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        AccountRepository { pool, writer }
    }

    fn list_impl(&self) -> Result<Vec<LinkedAccount>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = linked_accounts
            .order((created_at.asc(), id.asc()))
            .select(LinkedAccountDB::as_select())
            .load::<LinkedAccountDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| LinkedAccount::try_from(row).map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl AccountRepositoryTrait for AccountRepository {
    fn get_by_id(&self, account_id: &str) -> Result<LinkedAccount> {
        let mut conn = get_connection(&self.pool)?;
        load_account(&mut conn, account_id)
    }

    fn list(&self) -> Result<Vec<LinkedAccount>> {
        self.list_impl()
    }

    async fn create(&self, new_account: NewLinkedAccount) -> Result<LinkedAccount> {
        new_account.validate()?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<LinkedAccount> {
                let account_id = new_account
                    .id
                    .clone()
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let row = LinkedAccountDB::from_new(new_account, account_id, Utc::now());

                let inserted = diesel::insert_into(linked_accounts::table)
                    .values(&row)
                    .returning(LinkedAccountDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                Ok(LinkedAccount::try_from(inserted)?)
            })
            .await
    }

    async fn update_tokens(&self, account_id: &str, update: TokenUpdate) -> Result<LinkedAccount> {
        let account_id = account_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<LinkedAccount> {
                let changes = TokenChangesetDB {
                    refresh_token: update.refresh_token,
                    access_token: update.access_token,
                    updated_at: format_timestamp(Utc::now()),
                };
                let affected = diesel::update(linked_accounts.find(&account_id))
                    .set(&changes)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if affected == 0 {
                    return Err(not_found(&account_id));
                }
                load_account(conn, &account_id)
            })
            .await
    }

    async fn delete(&self, account_id: &str) -> Result<usize> {
        let account_id = account_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                Ok(diesel::delete(linked_accounts.find(account_id))
                    .execute(conn)
                    .map_err(StorageError::from)?)
            })
            .await
    }
}

#[async_trait]
impl CursorStore for AccountRepository {
    fn load_cursor(&self, account_id: &str) -> Result<SyncCursor> {
        let mut conn = get_connection(&self.pool)?;
        let nanos = linked_accounts
            .find(account_id)
            .select(last_processed_nanos)
            .first::<i64>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .ok_or_else(|| not_found(account_id))?;
        Ok(SyncCursor::from_nanos(nanos))
    }

    async fn store_cursor(&self, account_id: &str, cursor: SyncCursor) -> Result<()> {
        let account_id = account_id.to_string();
        let nanos = cursor.as_nanos();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let affected = diesel::update(
                    linked_accounts
                        .filter(id.eq(&account_id))
                        .filter(last_processed_nanos.le(nanos)),
                )
                .set(last_processed_nanos.eq(nanos))
                .execute(conn)
                .map_err(StorageError::from)?;

                if affected == 0 {
                    let exists = linked_accounts
                        .find(&account_id)
                        .select(id)
                        .first::<String>(conn)
                        .optional()
                        .map_err(StorageError::from)?
                        .is_some();
                    if !exists {
                        return Err(not_found(&account_id));
                    }
                    debug!(
                        "[Storage] Ignoring stale cursor {} for account {}",
                        nanos, account_id
                    );
                }
                Ok(())
            })
            .await
    }
}
