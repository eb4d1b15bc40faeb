//! Sync attempt state machine: start, fetch, aggregate, forward, advance cursor.

use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::errors::Result;

use super::sync_aggregator::aggregate_samples;
use super::sync_classifier::classify_fetch_error;
use super::sync_config::SyncConfig;
use super::sync_model::{
    Credential, RawSample, StreamDestination, SyncCursor, SyncErrorKind, SyncEvent,
    SyncEventKind, SyncOutcome, SyncReport, SyncState,
};
use super::sync_traits::{CursorStore, EventSink, SampleSource};
use super::sync_window::compute_fetch_window;

/// Tracks mutable progress during one attempt and builds the final report.
struct AttemptContext<'a> {
    account_id: &'a str,
    destination: &'a StreamDestination,
    state: SyncState,
    started_at: chrono::DateTime<Utc>,
    clock: Instant,
    cursor_before: SyncCursor,
    cursor_after: SyncCursor,
    events: Vec<SyncEventKind>,
}

impl<'a> AttemptContext<'a> {
    fn new(account_id: &'a str, destination: &'a StreamDestination) -> Self {
        Self {
            account_id,
            destination,
            state: SyncState::Idle,
            started_at: Utc::now(),
            clock: Instant::now(),
            cursor_before: SyncCursor::epoch(),
            cursor_after: SyncCursor::epoch(),
            events: Vec::with_capacity(2),
        }
    }

    fn transition(&mut self, next: SyncState) {
        debug!(
            "[StepSync] account={} {} -> {}",
            self.account_id,
            self.state.as_str(),
            next.as_str()
        );
        self.state = next;
    }

    fn finish(
        mut self,
        terminal: SyncState,
        outcome: SyncOutcome,
        error_kind: Option<SyncErrorKind>,
    ) -> SyncReport {
        self.transition(terminal);
        SyncReport {
            account_id: self.account_id.to_string(),
            state: self.state,
            outcome,
            error_kind,
            cursor_before: self.cursor_before,
            cursor_after: self.cursor_after,
            events: self.events,
            started_at: self.started_at,
            duration_ms: self.clock.elapsed().as_millis() as i64,
        }
    }
}

/// Runs one sync attempt for one account. Never retries internally; the
/// caller decides when to invoke it again.
pub struct SyncOrchestrator {
    config: SyncConfig,
    source: Arc<dyn SampleSource>,
    sink: Arc<dyn EventSink>,
    cursor_store: Arc<dyn CursorStore>,
}

impl SyncOrchestrator {
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn SampleSource>,
        sink: Arc<dyn EventSink>,
        cursor_store: Arc<dyn CursorStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            sink,
            cursor_store,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Lifecycle emission is best-effort: a failure is logged and the attempt goes on.
    async fn emit(&self, ctx: &mut AttemptContext<'_>, event: SyncEvent) {
        let kind = event.kind();
        match self.sink.emit_lifecycle(ctx.destination, &event).await {
            Ok(()) => debug!(
                "[StepSync] account={} emitted {} event",
                ctx.account_id,
                kind.as_str()
            ),
            Err(err) => warn!(
                "[StepSync] account={} failed to emit {} event: {}",
                ctx.account_id,
                kind.as_str(),
                err
            ),
        }
        ctx.events.push(kind);
    }

    /// Emit the error event and close the attempt without touching the cursor.
    async fn fail(
        &self,
        mut ctx: AttemptContext<'_>,
        terminal: SyncState,
        kind: SyncErrorKind,
        outcome: SyncOutcome,
    ) -> SyncReport {
        self.emit(&mut ctx, SyncEvent::Error { kind }).await;
        ctx.cursor_after = ctx.cursor_before;
        ctx.finish(terminal, outcome, Some(kind))
    }

    /// Executes the attempt. Every expected failure ends in a report, never an `Err`.
    pub async fn run(
        &self,
        account_id: &str,
        credential: &Credential,
        destination: &StreamDestination,
    ) -> SyncReport {
        let mut ctx = AttemptContext::new(account_id, destination);

        ctx.transition(SyncState::Started);
        self.emit(&mut ctx, SyncEvent::Start).await;

        let cursor = match self.cursor_store.load_cursor(account_id) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "[StepSync] account={} cursor load failed: {}",
                    account_id, err
                );
                return self
                    .fail(
                        ctx,
                        SyncState::Failed,
                        SyncErrorKind::Transient,
                        SyncOutcome::TransientError {
                            cause: format!("Cursor load failed: {}", err),
                        },
                    )
                    .await;
            }
        };
        ctx.cursor_before = cursor;
        ctx.cursor_after = cursor;

        let window = compute_fetch_window(&cursor, self.config.horizon, self.config.window_epsilon);
        ctx.transition(SyncState::Fetching);

        let fetched = if window.is_empty() {
            warn!(
                "[StepSync] account={} cursor {} reached the fetch horizon; nothing to fetch",
                account_id, cursor
            );
            Vec::new()
        } else {
            debug!(
                "[StepSync] account={} fetching dataset {}",
                account_id,
                window.dataset_id()
            );
            match self.source.fetch_samples(credential, &window).await {
                Ok(samples) => samples,
                Err(err) => {
                    let kind = classify_fetch_error(&err);
                    warn!(
                        "[StepSync] account={} fetch failed ({}): {}",
                        account_id,
                        kind.as_str(),
                        err
                    );
                    let outcome = match kind {
                        SyncErrorKind::Auth => SyncOutcome::AuthError,
                        _ => SyncOutcome::TransientError {
                            cause: err.to_string(),
                        },
                    };
                    return self.fail(ctx, SyncState::Failed, kind, outcome).await;
                }
            }
        };

        let (samples, out_of_window): (Vec<RawSample>, Vec<RawSample>) = fetched
            .into_iter()
            .partition(|sample| window.contains(sample.end_time));
        if !out_of_window.is_empty() {
            warn!(
                "[StepSync] account={} dropped {} samples outside {}",
                account_id,
                out_of_window.len(),
                window.dataset_id()
            );
        }

        ctx.transition(SyncState::Aggregating);
        let aggregation = match aggregate_samples(&samples, cursor, self.config.granularity) {
            Ok(aggregation) => aggregation,
            Err(err) => {
                warn!(
                    "[StepSync] account={} aggregation failed, cursor stays at {}: {}",
                    account_id, cursor, err
                );
                return self
                    .fail(
                        ctx,
                        SyncState::Failed,
                        SyncErrorKind::Transient,
                        SyncOutcome::TransientError {
                            cause: err.to_string(),
                        },
                    )
                    .await;
            }
        };
        let new_cursor = aggregation.max_end_time_seen;
        let buckets = aggregation.buckets;
        debug!(
            "[StepSync] account={} aggregated {} samples into {} buckets ({} steps)",
            account_id,
            aggregation.sample_count,
            buckets.len(),
            buckets.total()
        );

        ctx.transition(SyncState::Forwarding);
        if buckets.is_empty() {
            debug!("[StepSync] account={} no new buckets to forward", account_id);
        } else if let Err(err) = self.sink.forward_aggregated(destination, &buckets).await {
            warn!(
                "[StepSync] account={} forward failed, cursor stays at {}: {}",
                account_id, cursor, err
            );
            return self
                .fail(
                    ctx,
                    SyncState::ForwardFailed,
                    SyncErrorKind::ForwardFailure,
                    SyncOutcome::Success {
                        buckets,
                        new_cursor,
                    },
                )
                .await;
        }

        if new_cursor > cursor {
            if let Err(err) = self.cursor_store.store_cursor(account_id, new_cursor).await {
                // Data already went out; the next attempt re-sends this window.
                warn!(
                    "[StepSync] account={} cursor store failed after forward: {}",
                    account_id, err
                );
                return self
                    .fail(
                        ctx,
                        SyncState::Failed,
                        SyncErrorKind::Transient,
                        SyncOutcome::TransientError {
                            cause: format!("Cursor store failed: {}", err),
                        },
                    )
                    .await;
            }
            ctx.cursor_after = new_cursor;
        }

        self.emit(
            &mut ctx,
            SyncEvent::Complete {
                buckets: buckets.clone(),
            },
        )
        .await;
        info!(
            "[StepSync] account={} sync complete: {} buckets, {} steps, cursor {} -> {}",
            account_id,
            buckets.len(),
            buckets.total(),
            cursor,
            ctx.cursor_after
        );
        ctx.finish(
            SyncState::Completed,
            SyncOutcome::Success {
                buckets,
                new_cursor,
            },
            None,
        )
    }
}
