//! Collaborator contracts used by the sync engine.

use async_trait::async_trait;

use crate::errors::{FetchError, Result, SinkError};

use super::sync_model::{
    AggregatedBuckets, Credential, RawSample, StreamDestination, SyncCursor, SyncEvent,
    SyncRunRecord,
};
use super::sync_window::FetchWindow;

/// Upstream source of raw step samples.
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Returns every sample whose end time falls inside `window`.
    async fn fetch_samples(
        &self,
        credential: &Credential,
        window: &FetchWindow,
    ) -> std::result::Result<Vec<RawSample>, FetchError>;

    /// Refresh token issued in place of `credential.refresh_token` during a
    /// previous fetch, if the upstream rotated it. Returned once.
    fn take_rotated_refresh_token(&self, _credential: &Credential) -> Option<String> {
        None
    }
}

/// Downstream event ingestion API.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Sends one tagged event per bucket as a single batch.
    async fn forward_aggregated(
        &self,
        destination: &StreamDestination,
        buckets: &AggregatedBuckets,
    ) -> std::result::Result<(), SinkError>;

    async fn emit_lifecycle(
        &self,
        destination: &StreamDestination,
        event: &SyncEvent,
    ) -> std::result::Result<(), SinkError>;
}

/// Per-account cursor persistence.
#[async_trait]
pub trait CursorStore: Send + Sync {
    fn load_cursor(&self, account_id: &str) -> Result<SyncCursor>;

    /// Persists `cursor`. Implementations must never move a stored cursor backwards.
    async fn store_cursor(&self, account_id: &str, cursor: SyncCursor) -> Result<()>;
}

/// History of finished sync attempts.
#[async_trait]
pub trait SyncRunRepositoryTrait: Send + Sync {
    async fn record_run(&self, record: SyncRunRecord) -> Result<()>;

    /// Most recent runs first.
    fn list_recent(&self, account_id: &str, limit: i64) -> Result<Vec<SyncRunRecord>>;
}
