use super::*;
use crate::accounts::{AccountRepositoryTrait, LinkedAccount, NewLinkedAccount, TokenUpdate};
use crate::errors::{DatabaseError, Error, FetchError, Result, SinkError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

fn at(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

fn sample(end_time: &str, value: i64) -> RawSample {
    RawSample::new(at(end_time), value)
}

#[derive(Default)]
struct FakeSource {
    samples: Mutex<Vec<RawSample>>,
    error: Mutex<Option<FetchError>>,
    windows: Mutex<Vec<FetchWindow>>,
    hold: Mutex<Option<Arc<Notify>>>,
    rotated: Mutex<Option<String>>,
}

impl FakeSource {
    fn with_samples(samples: Vec<RawSample>) -> Self {
        let source = Self::default();
        *source.samples.lock().unwrap() = samples;
        source
    }

    fn failing(err: FetchError) -> Self {
        let source = Self::default();
        *source.error.lock().unwrap() = Some(err);
        source
    }

    fn fetch_count(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}

#[async_trait]
impl SampleSource for FakeSource {
    async fn fetch_samples(
        &self,
        _credential: &Credential,
        window: &FetchWindow,
    ) -> std::result::Result<Vec<RawSample>, FetchError> {
        self.windows.lock().unwrap().push(*window);
        let hold = self.hold.lock().unwrap().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        if let Some(err) = self.error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.samples.lock().unwrap().clone())
    }

    fn take_rotated_refresh_token(&self, _credential: &Credential) -> Option<String> {
        self.rotated.lock().unwrap().take()
    }
}

#[derive(Default)]
struct RecordingSink {
    fail_forward: AtomicBool,
    fail_lifecycle: AtomicBool,
    lifecycle: Mutex<Vec<SyncEvent>>,
    forwarded: Mutex<Vec<AggregatedBuckets>>,
}

impl RecordingSink {
    fn lifecycle_kinds(&self) -> Vec<SyncEventKind> {
        self.lifecycle
            .lock()
            .unwrap()
            .iter()
            .map(SyncEvent::kind)
            .collect()
    }

    fn errors(&self) -> Vec<SyncErrorKind> {
        self.lifecycle
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                SyncEvent::Error { kind } => Some(*kind),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn forward_aggregated(
        &self,
        _destination: &StreamDestination,
        buckets: &AggregatedBuckets,
    ) -> std::result::Result<(), SinkError> {
        if self.fail_forward.load(Ordering::SeqCst) {
            return Err(SinkError::Transport("connection refused".to_string()));
        }
        self.forwarded.lock().unwrap().push(buckets.clone());
        Ok(())
    }

    async fn emit_lifecycle(
        &self,
        _destination: &StreamDestination,
        event: &SyncEvent,
    ) -> std::result::Result<(), SinkError> {
        // Recorded even when failing so tests can see what was attempted.
        self.lifecycle.lock().unwrap().push(event.clone());
        if self.fail_lifecycle.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected {
                status: 500,
                message: "boom".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemoryCursorStore {
    cursors: Mutex<HashMap<String, SyncCursor>>,
    fail_load: AtomicBool,
    fail_store: AtomicBool,
}

impl MemoryCursorStore {
    fn at(account_id: &str, cursor: SyncCursor) -> Self {
        let store = Self::default();
        store
            .cursors
            .lock()
            .unwrap()
            .insert(account_id.to_string(), cursor);
        store
    }

    fn get(&self, account_id: &str) -> SyncCursor {
        self.cursors
            .lock()
            .unwrap()
            .get(account_id)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    fn load_cursor(&self, account_id: &str) -> Result<SyncCursor> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(DatabaseError::ConnectionFailed("pool exhausted".to_string()).into());
        }
        Ok(self.get(account_id))
    }

    async fn store_cursor(&self, account_id: &str, cursor: SyncCursor) -> Result<()> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryFailed("disk I/O error".to_string()).into());
        }
        let mut cursors = self.cursors.lock().unwrap();
        let current = cursors.entry(account_id.to_string()).or_default();
        if cursor > *current {
            *current = cursor;
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemoryRuns {
    runs: Mutex<Vec<SyncRunRecord>>,
}

#[async_trait]
impl SyncRunRepositoryTrait for MemoryRuns {
    async fn record_run(&self, record: SyncRunRecord) -> Result<()> {
        self.runs.lock().unwrap().push(record);
        Ok(())
    }

    fn list_recent(&self, account_id: &str, limit: i64) -> Result<Vec<SyncRunRecord>> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|run| run.account_id == account_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

struct MemoryAccounts {
    accounts: Mutex<HashMap<String, LinkedAccount>>,
}

impl MemoryAccounts {
    fn with(ids: &[&str]) -> Self {
        let now = Utc::now();
        let accounts = ids
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    LinkedAccount {
                        id: id.to_string(),
                        user_name: format!("user-{id}"),
                        refresh_token: format!("refresh-{id}"),
                        access_token: None,
                        stream_id: format!("stream-{id}"),
                        write_token: format!("write-{id}"),
                        read_token: None,
                        last_processed_time: SyncCursor::epoch().last_processed_time,
                        created_at: now,
                        updated_at: now,
                    },
                )
            })
            .collect();
        Self {
            accounts: Mutex::new(accounts),
        }
    }
}

#[async_trait]
impl AccountRepositoryTrait for MemoryAccounts {
    fn get_by_id(&self, account_id: &str) -> Result<LinkedAccount> {
        self.accounts
            .lock()
            .unwrap()
            .get(account_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(account_id.to_string()))
    }

    fn list(&self) -> Result<Vec<LinkedAccount>> {
        let mut accounts: Vec<_> = self.accounts.lock().unwrap().values().cloned().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }

    async fn create(&self, _new_account: NewLinkedAccount) -> Result<LinkedAccount> {
        Err(Error::Unexpected("not used".to_string()))
    }

    async fn update_tokens(&self, account_id: &str, update: TokenUpdate) -> Result<LinkedAccount> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(account_id)
            .ok_or_else(|| Error::NotFound(account_id.to_string()))?;
        if let Some(token) = update.refresh_token {
            account.refresh_token = token;
        }
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn delete(&self, account_id: &str) -> Result<usize> {
        Ok(usize::from(
            self.accounts.lock().unwrap().remove(account_id).is_some(),
        ))
    }
}

fn credential() -> Credential {
    Credential {
        refresh_token: "refresh".to_string(),
        access_token: None,
    }
}

fn destination() -> StreamDestination {
    StreamDestination {
        stream_id: "STREAM1".to_string(),
        write_token: "wt".to_string(),
    }
}

fn orchestrator(
    source: &Arc<FakeSource>,
    sink: &Arc<RecordingSink>,
    store: &Arc<MemoryCursorStore>,
) -> SyncOrchestrator {
    SyncOrchestrator::new(
        SyncConfig::default(),
        source.clone(),
        sink.clone(),
        store.clone(),
    )
    .expect("valid config")
}

#[tokio::test]
async fn scenario_hourly_buckets_advance_cursor() {
    let start = SyncCursor::new(at("2024-01-01T00:00:00Z"));
    let source = Arc::new(FakeSource::with_samples(vec![
        sample("2024-01-01T00:10:00Z", 5),
        sample("2024-01-01T00:40:00Z", 3),
        sample("2024-01-01T01:05:00Z", 2),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::at("acc-1", start));

    let report = orchestrator(&source, &sink, &store)
        .run("acc-1", &credential(), &destination())
        .await;

    let expected: AggregatedBuckets = [
        ("2024-01-01T00:00:00Z".to_string(), 8),
        ("2024-01-01T01:00:00Z".to_string(), 2),
    ]
    .into_iter()
    .collect();
    let new_cursor = SyncCursor::new(at("2024-01-01T01:05:00Z"));

    assert_eq!(report.state, SyncState::Completed);
    assert_eq!(
        report.outcome,
        SyncOutcome::Success {
            buckets: expected.clone(),
            new_cursor,
        }
    );
    assert_eq!(report.error_kind, None);
    assert_eq!(report.cursor_before, start);
    assert_eq!(report.cursor_after, new_cursor);
    assert_eq!(store.get("acc-1"), new_cursor);
    assert_eq!(*sink.forwarded.lock().unwrap(), vec![expected.clone()]);
    assert_eq!(
        sink.lifecycle_kinds(),
        vec![SyncEventKind::Start, SyncEventKind::Complete]
    );
    assert_eq!(
        sink.lifecycle.lock().unwrap().last(),
        Some(&SyncEvent::Complete { buckets: expected })
    );

    let window = source.windows.lock().unwrap()[0];
    assert_eq!(
        window.from_nanos(),
        start.as_nanos() + WINDOW_EPSILON_NANOS
    );
    assert_eq!(window.horizon_nanos(), DEFAULT_HORIZON_NANOS);
}

#[tokio::test]
async fn auth_rejection_leaves_cursor_untouched() {
    let start = SyncCursor::new(at("2024-01-01T00:00:00Z"));
    let source = Arc::new(FakeSource::failing(FetchError::unauthorized(
        "invalid_grant",
    )));
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::at("acc-1", start));

    let report = orchestrator(&source, &sink, &store)
        .run("acc-1", &credential(), &destination())
        .await;

    assert_eq!(report.state, SyncState::Failed);
    assert_eq!(report.outcome, SyncOutcome::AuthError);
    assert_eq!(report.error_kind, Some(SyncErrorKind::Auth));
    assert_eq!(report.cursor_after, start);
    assert_eq!(store.get("acc-1"), start);
    assert_eq!(
        sink.lifecycle_kinds(),
        vec![SyncEventKind::Start, SyncEventKind::Error]
    );
    assert_eq!(sink.errors(), vec![SyncErrorKind::Auth]);
    assert!(sink.forwarded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn transient_fetch_failure_keeps_cursor() {
    let start = SyncCursor::new(at("2024-02-01T08:00:00Z"));
    let source = Arc::new(FakeSource::failing(FetchError::api(503, "backend error")));
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::at("acc-1", start));

    let report = orchestrator(&source, &sink, &store)
        .run("acc-1", &credential(), &destination())
        .await;

    assert_eq!(report.state, SyncState::Failed);
    assert!(matches!(
        report.outcome,
        SyncOutcome::TransientError { ref cause } if cause.contains("503")
    ));
    assert_eq!(store.get("acc-1"), start);
    assert_eq!(sink.errors(), vec![SyncErrorKind::Transient]);
}

#[tokio::test]
async fn forward_failure_emits_one_error_and_keeps_cursor() {
    let start = SyncCursor::new(at("2024-01-01T00:00:00Z"));
    let source = Arc::new(FakeSource::with_samples(vec![sample(
        "2024-01-01T00:10:00Z",
        5,
    )]));
    let sink = Arc::new(RecordingSink::default());
    sink.fail_forward.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryCursorStore::at("acc-1", start));

    let report = orchestrator(&source, &sink, &store)
        .run("acc-1", &credential(), &destination())
        .await;

    assert_eq!(report.state, SyncState::ForwardFailed);
    assert_eq!(report.error_kind, Some(SyncErrorKind::ForwardFailure));
    assert_eq!(report.cursor_after, start);
    assert_eq!(store.get("acc-1"), start);
    assert_eq!(sink.errors(), vec![SyncErrorKind::ForwardFailure]);
    assert_eq!(
        sink.lifecycle_kinds(),
        vec![SyncEventKind::Start, SyncEventKind::Error]
    );
}

#[tokio::test]
async fn oversized_step_values_fail_transiently_and_keep_cursor() {
    let start = SyncCursor::new(at("2024-01-01T00:00:00Z"));
    let source = Arc::new(FakeSource::with_samples(vec![
        sample("2024-01-01T00:10:00Z", i64::MAX),
        sample("2024-01-01T00:20:00Z", 1),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::at("acc-1", start));

    let report = orchestrator(&source, &sink, &store)
        .run("acc-1", &credential(), &destination())
        .await;

    assert_eq!(report.state, SyncState::Failed);
    assert_eq!(report.error_kind, Some(SyncErrorKind::Transient));
    assert!(matches!(
        report.outcome,
        SyncOutcome::TransientError { ref cause } if cause.contains("overflows")
    ));
    assert_eq!(report.cursor_after, start);
    assert_eq!(store.get("acc-1"), start);
    assert_eq!(
        sink.lifecycle_kinds(),
        vec![SyncEventKind::Start, SyncEventKind::Error]
    );
    assert_eq!(sink.errors(), vec![SyncErrorKind::Transient]);
    assert!(sink.forwarded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn lifecycle_failures_do_not_abort_the_attempt() {
    let source = Arc::new(FakeSource::with_samples(vec![sample(
        "2024-01-01T00:10:00Z",
        5,
    )]));
    let sink = Arc::new(RecordingSink::default());
    sink.fail_lifecycle.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryCursorStore::default());

    let report = orchestrator(&source, &sink, &store)
        .run("acc-1", &credential(), &destination())
        .await;

    assert_eq!(report.state, SyncState::Completed);
    assert_eq!(sink.forwarded.lock().unwrap().len(), 1);
    assert_eq!(
        store.get("acc-1"),
        SyncCursor::new(at("2024-01-01T00:10:00Z"))
    );
    assert_eq!(
        report.events,
        vec![SyncEventKind::Start, SyncEventKind::Complete]
    );
}

#[tokio::test]
async fn empty_fetch_completes_without_forwarding() {
    let start = SyncCursor::new(at("2024-01-01T00:00:00Z"));
    let source = Arc::new(FakeSource::default());
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::at("acc-1", start));

    let report = orchestrator(&source, &sink, &store)
        .run("acc-1", &credential(), &destination())
        .await;

    assert_eq!(report.state, SyncState::Completed);
    assert_eq!(report.bucket_count(), 0);
    assert_eq!(report.cursor_after, start);
    assert!(sink.forwarded.lock().unwrap().is_empty());
    assert_eq!(
        sink.lifecycle_kinds(),
        vec![SyncEventKind::Start, SyncEventKind::Complete]
    );
}

#[tokio::test]
async fn samples_outside_the_window_are_dropped() {
    let start = SyncCursor::new(at("2024-01-01T01:05:00Z"));
    let source = Arc::new(FakeSource::with_samples(vec![
        // Already counted by the previous run.
        sample("2024-01-01T01:05:00Z", 2),
        sample("2024-01-01T01:30:00Z", 7),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::at("acc-1", start));

    let report = orchestrator(&source, &sink, &store)
        .run("acc-1", &credential(), &destination())
        .await;

    assert_eq!(report.total_steps(), 7);
    assert_eq!(
        store.get("acc-1"),
        SyncCursor::new(at("2024-01-01T01:30:00Z"))
    );
}

#[tokio::test]
async fn cursor_load_failure_skips_fetch() {
    let source = Arc::new(FakeSource::default());
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::default());
    store.fail_load.store(true, Ordering::SeqCst);

    let report = orchestrator(&source, &sink, &store)
        .run("acc-1", &credential(), &destination())
        .await;

    assert_eq!(report.state, SyncState::Failed);
    assert_eq!(report.error_kind, Some(SyncErrorKind::Transient));
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn cursor_store_failure_after_forward_is_transient() {
    let start = SyncCursor::new(at("2024-01-01T00:00:00Z"));
    let source = Arc::new(FakeSource::with_samples(vec![sample(
        "2024-01-01T00:10:00Z",
        5,
    )]));
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::at("acc-1", start));
    store.fail_store.store(true, Ordering::SeqCst);

    let report = orchestrator(&source, &sink, &store)
        .run("acc-1", &credential(), &destination())
        .await;

    assert_eq!(report.state, SyncState::Failed);
    assert_eq!(report.error_kind, Some(SyncErrorKind::Transient));
    assert_eq!(report.cursor_after, start);
    assert_eq!(sink.forwarded.lock().unwrap().len(), 1);
    assert_eq!(sink.errors(), vec![SyncErrorKind::Transient]);
}

#[tokio::test]
async fn second_run_does_not_reprocess_samples() {
    let source = Arc::new(FakeSource::with_samples(vec![
        sample("2024-01-01T00:10:00Z", 5),
        sample("2024-01-01T00:40:00Z", 3),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::default());
    let orchestrator = orchestrator(&source, &sink, &store);

    let first = orchestrator
        .run("acc-1", &credential(), &destination())
        .await;
    let second = orchestrator
        .run("acc-1", &credential(), &destination())
        .await;

    assert_eq!(first.total_steps(), 8);
    assert_eq!(second.total_steps(), 0);
    assert_eq!(sink.forwarded.lock().unwrap().len(), 1);
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let source = Arc::new(FakeSource::default());
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::default());
    let config = SyncConfig {
        window_epsilon: chrono::Duration::zero(),
        ..SyncConfig::default()
    };
    assert!(SyncOrchestrator::new(config, source, sink, store).is_err());
}

struct ServiceFixture {
    source: Arc<FakeSource>,
    sink: Arc<RecordingSink>,
    accounts: Arc<MemoryAccounts>,
    runs: Arc<MemoryRuns>,
    service: Arc<SyncService>,
}

fn service_fixture(ids: &[&str], source: FakeSource) -> ServiceFixture {
    let source = Arc::new(source);
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryCursorStore::default());
    let accounts = Arc::new(MemoryAccounts::with(ids));
    let runs = Arc::new(MemoryRuns::default());
    let orchestrator = Arc::new(orchestrator(&source, &sink, &store));
    let service = Arc::new(SyncService::new(
        accounts.clone(),
        runs.clone(),
        source.clone(),
        orchestrator,
    ));
    ServiceFixture {
        source,
        sink,
        accounts,
        runs,
        service,
    }
}

#[tokio::test]
async fn service_records_a_run_per_attempt() {
    let fixture = service_fixture(
        &["acc-1"],
        FakeSource::with_samples(vec![sample("2024-01-01T00:10:00Z", 5)]),
    );

    let report = fixture
        .service
        .sync_account("acc-1")
        .await
        .expect("sync");

    let runs = fixture.service.recent_runs("acc-1", 10).expect("runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].state, SyncState::Completed);
    assert_eq!(runs[0].total_steps, 5);
    assert_eq!(runs[0].cursor_after, report.cursor_after);
    assert!(!fixture.service.is_running("acc-1"));
}

#[tokio::test]
async fn service_records_forward_failure_without_delivered_steps() {
    let fixture = service_fixture(
        &["acc-1"],
        FakeSource::with_samples(vec![sample("2024-01-01T00:10:00Z", 5)]),
    );
    fixture.sink.fail_forward.store(true, Ordering::SeqCst);

    let report = fixture
        .service
        .sync_account("acc-1")
        .await
        .expect("sync");
    assert_eq!(report.state, SyncState::ForwardFailed);

    let runs = fixture.service.recent_runs("acc-1", 10).expect("runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].state, SyncState::ForwardFailed);
    assert_eq!(runs[0].bucket_count, 0);
    assert_eq!(runs[0].total_steps, 0);
}

#[tokio::test]
async fn service_rejects_unknown_account() {
    let fixture = service_fixture(&[], FakeSource::default());
    let result = fixture.service.sync_account("missing").await;
    assert!(matches!(
        result,
        Err(SyncServiceError::Core(Error::NotFound(_)))
    ));
    assert!(fixture.runs.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn service_persists_rotated_refresh_token() {
    let source = FakeSource::default();
    *source.rotated.lock().unwrap() = Some("refresh-rotated".to_string());
    let fixture = service_fixture(&["acc-1"], source);

    fixture
        .service
        .sync_account("acc-1")
        .await
        .expect("sync");

    let account = fixture.accounts.get_by_id("acc-1").expect("account");
    assert_eq!(account.refresh_token, "refresh-rotated");
}

#[tokio::test]
async fn concurrent_trigger_for_same_account_is_rejected() {
    let hold = Arc::new(Notify::new());
    let source = FakeSource::with_samples(vec![sample("2024-01-01T00:10:00Z", 5)]);
    *source.hold.lock().unwrap() = Some(hold.clone());
    let fixture = service_fixture(&["acc-1"], source);

    let service = fixture.service.clone();
    let first = tokio::spawn(async move { service.sync_account("acc-1").await });

    while fixture.source.fetch_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(fixture.service.is_running("acc-1"));
    let second = fixture.service.sync_account("acc-1").await;
    assert!(matches!(second, Err(SyncServiceError::AlreadyRunning(_))));

    hold.notify_one();
    let report = first.await.expect("join").expect("first sync");
    assert_eq!(report.state, SyncState::Completed);
    assert_eq!(fixture.sink.forwarded.lock().unwrap().len(), 1);
    assert_eq!(fixture.runs.runs.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn scheduler_tick_syncs_every_due_account() {
    let fixture = service_fixture(
        &["acc-1", "acc-2"],
        FakeSource::with_samples(vec![sample("2024-01-01T00:10:00Z", 5)]),
    );
    let scheduler = SyncScheduler::new(
        fixture.service.clone(),
        fixture.accounts.clone(),
        Duration::from_secs(SYNC_INTERVAL_SECS),
    );

    let summary = scheduler.run_tick().await.expect("tick");

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(fixture.source.fetch_count(), 2);
}

#[tokio::test]
async fn scheduler_skips_accounts_needing_reauth() {
    let fixture = service_fixture(
        &["acc-1"],
        FakeSource::failing(FetchError::unauthorized("token revoked")),
    );
    let scheduler = SyncScheduler::new(
        fixture.service.clone(),
        fixture.accounts.clone(),
        Duration::from_secs(SYNC_INTERVAL_SECS),
    );

    let first = scheduler.run_tick().await.expect("first tick");
    assert_eq!(first.failed, 1);

    let second = scheduler.run_tick().await.expect("second tick");
    assert_eq!(second.attempted, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(fixture.source.fetch_count(), 1);
}

#[tokio::test]
async fn scheduler_start_is_idempotent_and_stop_halts_it() {
    let fixture = service_fixture(&[], FakeSource::default());
    let scheduler = Arc::new(SyncScheduler::new(
        fixture.service.clone(),
        fixture.accounts.clone(),
        Duration::from_secs(SYNC_INTERVAL_SECS),
    ));

    scheduler.start().await;
    scheduler.start().await;
    assert!(scheduler.is_running().await);

    scheduler.stop().await;
    assert!(!scheduler.is_running().await);
}
