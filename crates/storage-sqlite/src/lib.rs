//! SQLite persistence for linked accounts, sync cursors and run history.

pub mod accounts;
pub mod db;
pub mod errors;
pub mod schema;
pub mod sync_runs;
mod timestamps;

pub use accounts::AccountRepository;
pub use db::{
    create_pool, get_connection, init, init_at, run_migrations, spawn_writer, DbPool, WriteHandle,
};
pub use errors::StorageError;
pub use sync_runs::SyncRunRepository;
