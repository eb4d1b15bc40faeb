//! Single writer thread. SQLite allows one writer at a time, so every write
//! closure is queued here and run inside an immediate transaction.

use diesel::sqlite::SqliteConnection;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use stepsync_core::errors::{DatabaseError, Error, Result};

use super::DbPool;
use crate::errors::StorageError;

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Cloneable handle to the writer thread.
#[derive(Clone, Debug)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl WriteHandle {
    /// Runs `f` on the writer connection in an immediate transaction. An
    /// `Err` from `f` rolls the transaction back and is returned unchanged.
    pub async fn exec<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            let _ = reply_tx.send(run_in_transaction(conn, f));
        });

        self.tx.send(job).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Database writer has stopped".to_string(),
            ))
        })?;

        reply_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Database writer dropped the job".to_string(),
            ))
        })?
    }
}

fn run_in_transaction<F, T>(conn: &mut SqliteConnection, f: F) -> Result<T>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T>,
{
    let mut job_error: Option<Error> = None;
    let outcome = conn.immediate_transaction::<T, diesel::result::Error, _>(|tx_conn| {
        f(tx_conn).map_err(|e| {
            job_error = Some(e);
            diesel::result::Error::RollbackTransaction
        })
    });

    match outcome {
        Ok(value) => Ok(value),
        Err(e) => Err(job_error.unwrap_or_else(|| StorageError::from(e).into())),
    }
}

/// Starts the writer thread. It exits once every handle is dropped.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

    std::thread::Builder::new()
        .name("stepsync-db-writer".to_string())
        .spawn(move || {
            debug!("[Storage] Writer thread started");
            while let Some(job) = rx.blocking_recv() {
                match pool.get() {
                    Ok(mut conn) => job(&mut *conn),
                    // Dropping the job drops its reply sender; the caller sees the error.
                    Err(e) => error!("[Storage] Writer could not get a connection: {}", e),
                }
            }
            debug!("[Storage] Writer thread stopped");
        })
        .map(|_| ())
        .unwrap_or_else(|e| error!("[Storage] Failed to start writer thread: {}", e));

    WriteHandle { tx }
}
