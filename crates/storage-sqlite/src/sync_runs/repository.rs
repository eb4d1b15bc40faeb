use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;

use stepsync_core::errors::{Error, Result};
use stepsync_core::sync::{SyncRunRecord, SyncRunRepositoryTrait};

use super::model::SyncRunDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sync_runs;

pub struct SyncRunRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SyncRunRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        SyncRunRepository { pool, writer }
    }
}

#[async_trait]
impl SyncRunRepositoryTrait for SyncRunRepository {
    async fn record_run(&self, record: SyncRunRecord) -> Result<()> {
        let row = SyncRunDB::from(record);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(sync_runs::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn list_recent(&self, account_id: &str, limit: i64) -> Result<Vec<SyncRunRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_runs::table
            .filter(sync_runs::account_id.eq(account_id))
            .order((sync_runs::started_at.desc(), sync_runs::id.desc()))
            .limit(limit.max(0))
            .select(SyncRunDB::as_select())
            .load::<SyncRunDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| SyncRunRecord::try_from(row).map_err(Error::from))
            .collect()
    }
}
