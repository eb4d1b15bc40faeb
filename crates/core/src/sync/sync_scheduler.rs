//! Periodic background sync over every linked account.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::accounts::{AccountRepositoryTrait, LinkedAccount};
use crate::errors::Result;

use super::sync_classifier::retry_delay_secs;
use super::sync_model::{SyncErrorKind, SyncRunRecord, SyncState};
use super::sync_service::{SyncServiceError, SyncServiceTrait};

/// Background pull cadence in seconds.
pub const SYNC_INTERVAL_SECS: u64 = 15 * 60;

/// Maximum jitter (seconds) added to each interval.
pub const SYNC_INTERVAL_JITTER_SECS: u64 = 30;

/// Runs inspected when deciding whether an account is due.
const RECENT_RUNS_WINDOW: i64 = 10;

/// Why an account was left out of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Last attempt was rejected upstream and the account was not re-linked since.
    NeedsReauth,
    /// Still inside the backoff after consecutive failures.
    BackingOff { retry_in_secs: i64 },
}

/// Decides whether `account` should be synced at `now`, given its most recent
/// runs (newest first). Backoff never exceeds `interval_secs`, so a failing
/// account is retried no later than the next regular tick.
pub fn should_attempt(
    account: &LinkedAccount,
    recent_runs: &[SyncRunRecord],
    interval_secs: u64,
    now: DateTime<Utc>,
) -> std::result::Result<(), SkipReason> {
    let Some(last) = recent_runs.first() else {
        return Ok(());
    };

    if last.error_kind == Some(SyncErrorKind::Auth) && last.started_at >= account.updated_at {
        return Err(SkipReason::NeedsReauth);
    }

    let consecutive_failures = recent_runs
        .iter()
        .take_while(|run| run.state != SyncState::Completed)
        .count();
    if consecutive_failures == 0 {
        return Ok(());
    }

    let delay = retry_delay_secs(consecutive_failures, interval_secs);
    let elapsed = (now - last.started_at).num_seconds();
    if elapsed < delay {
        return Err(SkipReason::BackingOff {
            retry_in_secs: delay - elapsed,
        });
    }
    Ok(())
}

/// Summary of one scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct SyncScheduler {
    sync_service: Arc<dyn SyncServiceTrait>,
    accounts: Arc<dyn AccountRepositoryTrait>,
    interval: Duration,
    background_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(
        sync_service: Arc<dyn SyncServiceTrait>,
        accounts: Arc<dyn AccountRepositoryTrait>,
        interval: Duration,
    ) -> Self {
        Self {
            sync_service,
            accounts,
            interval,
            background_task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Syncs every due account once, concurrently.
    pub async fn run_tick(&self) -> Result<TickSummary> {
        let accounts = self.accounts.list()?;
        let now = Utc::now();
        let mut summary = TickSummary::default();

        let mut due = Vec::with_capacity(accounts.len());
        for account in accounts {
            let runs = match self.sync_service.recent_runs(&account.id, RECENT_RUNS_WINDOW) {
                Ok(runs) => runs,
                Err(err) => {
                    warn!(
                        "[StepSync] account={} could not load run history, syncing anyway: {}",
                        account.id, err
                    );
                    Vec::new()
                }
            };
            match should_attempt(&account, &runs, self.interval.as_secs(), now) {
                Ok(()) => due.push(account.id),
                Err(reason) => {
                    debug!("[StepSync] account={} skipped: {:?}", account.id, reason);
                    summary.skipped += 1;
                }
            }
        }

        let results = join_all(
            due.iter()
                .map(|account_id| self.sync_service.sync_account(account_id)),
        )
        .await;

        for (account_id, result) in due.iter().zip(results) {
            match result {
                Ok(report) => {
                    summary.attempted += 1;
                    if report.error_kind.is_none() {
                        summary.completed += 1;
                    } else {
                        summary.failed += 1;
                    }
                }
                Err(SyncServiceError::AlreadyRunning(_)) => summary.skipped += 1,
                Err(err) => {
                    warn!("[StepSync] account={} tick failed: {}", account_id, err);
                    summary.attempted += 1;
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    fn next_delay(&self) -> Duration {
        let jitter_ms = if SYNC_INTERVAL_JITTER_SECS > 0 {
            rand::thread_rng().gen_range(0..SYNC_INTERVAL_JITTER_SECS * 1000)
        } else {
            0
        };
        self.interval + Duration::from_millis(jitter_ms)
    }

    /// Spawns the background loop. Starting an already running loop is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match scheduler.run_tick().await {
                    Ok(summary) => info!(
                        "[StepSync] Tick complete attempted={} completed={} failed={} skipped={}",
                        summary.attempted, summary.completed, summary.failed, summary.skipped
                    ),
                    Err(err) => warn!("[StepSync] Background tick failed: {}", err),
                }
                tokio::time::sleep(scheduler.next_delay()).await;
            }
        });
        info!(
            "[StepSync] Background scheduler started (interval {}s)",
            self.interval.as_secs()
        );
        *guard = Some(handle);
    }

    pub async fn stop(&self) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
            info!("[StepSync] Background scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.background_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncCursor;
    use chrono::Duration as ChronoDuration;

    fn account(updated_at: DateTime<Utc>) -> LinkedAccount {
        LinkedAccount {
            id: "acc-1".to_string(),
            user_name: "walker".to_string(),
            refresh_token: "1//refresh".to_string(),
            access_token: None,
            stream_id: "STREAM1".to_string(),
            write_token: "wt".to_string(),
            read_token: None,
            last_processed_time: SyncCursor::epoch().last_processed_time,
            created_at: updated_at,
            updated_at,
        }
    }

    fn run(
        state: SyncState,
        kind: Option<SyncErrorKind>,
        started_at: DateTime<Utc>,
    ) -> SyncRunRecord {
        SyncRunRecord {
            id: uuid::Uuid::now_v7().to_string(),
            account_id: "acc-1".to_string(),
            state,
            error_kind: kind,
            error_message: None,
            cursor_before: SyncCursor::epoch(),
            cursor_after: SyncCursor::epoch(),
            bucket_count: 0,
            total_steps: 0,
            started_at,
            duration_ms: 10,
        }
    }

    #[test]
    fn account_without_history_is_due() {
        let now = Utc::now();
        assert_eq!(should_attempt(&account(now), &[], SYNC_INTERVAL_SECS, now), Ok(()));
    }

    #[test]
    fn auth_failure_blocks_until_relinked() {
        let now = Utc::now();
        let linked_at = now - ChronoDuration::hours(2);
        let runs = [run(
            SyncState::Failed,
            Some(SyncErrorKind::Auth),
            now - ChronoDuration::hours(1),
        )];

        assert_eq!(
            should_attempt(&account(linked_at), &runs, SYNC_INTERVAL_SECS, now),
            Err(SkipReason::NeedsReauth)
        );

        let relinked = account(now - ChronoDuration::minutes(5));
        assert_eq!(should_attempt(&relinked, &runs, SYNC_INTERVAL_SECS, now), Ok(()));
    }

    #[test]
    fn transient_failures_back_off_but_not_past_the_interval() {
        let now = Utc::now();
        let linked = account(now - ChronoDuration::days(1));
        let just_failed = [run(
            SyncState::Failed,
            Some(SyncErrorKind::Transient),
            now - ChronoDuration::seconds(1),
        )];
        assert!(matches!(
            should_attempt(&linked, &just_failed, SYNC_INTERVAL_SECS, now),
            Err(SkipReason::BackingOff { .. })
        ));

        let many: Vec<_> = (0..9)
            .map(|i| {
                run(
                    SyncState::ForwardFailed,
                    Some(SyncErrorKind::ForwardFailure),
                    now - ChronoDuration::seconds(SYNC_INTERVAL_SECS as i64 + i),
                )
            })
            .collect();
        assert_eq!(should_attempt(&linked, &many, SYNC_INTERVAL_SECS, now), Ok(()));
    }

    #[test]
    fn success_resets_backoff() {
        let now = Utc::now();
        let runs = [run(SyncState::Completed, None, now)];
        assert_eq!(
            should_attempt(&account(now - ChronoDuration::days(1)), &runs, SYNC_INTERVAL_SECS, now),
            Ok(())
        );
    }
}
