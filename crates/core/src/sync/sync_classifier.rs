//! Failure classification and retry helpers for the sync engine.

use crate::errors::FetchError;

use super::sync_model::{SyncErrorKind, SyncRetryClass};

/// Retry behavior for a status answered by Google Fit, its token endpoint or 1self.
///
/// A rejected credential needs the user to re-link. Throttling and server
/// errors heal on their own.
pub fn retry_class_for_status(status: u16) -> SyncRetryClass {
    match status {
        401 | 403 => SyncRetryClass::ReauthRequired,
        408 | 429 | 500..=599 => SyncRetryClass::Retryable,
        _ => SyncRetryClass::Permanent,
    }
}

/// Assigns a fetch failure to exactly one error kind.
///
/// Only a rejected credential is `Auth`; every other failure, permanent
/// looking or not, is retried at the next scheduled sync.
pub fn classify_fetch_error(err: &FetchError) -> SyncErrorKind {
    match err {
        FetchError::Unauthorized(_) => SyncErrorKind::Auth,
        FetchError::Api { status, .. } => match retry_class_for_status(*status) {
            SyncRetryClass::ReauthRequired => SyncErrorKind::Auth,
            SyncRetryClass::Retryable | SyncRetryClass::Permanent => SyncErrorKind::Transient,
        },
        FetchError::Transport(_) | FetchError::Timeout(_) | FetchError::Malformed(_) => {
            SyncErrorKind::Transient
        }
    }
}

const FIRST_RETRY_DELAY_SECS: i64 = 5;
const MAX_DOUBLINGS: u32 = 8;

/// Seconds the scheduler waits after `consecutive_failures` failed runs of an
/// account before trying it again.
///
/// Starts at five seconds and doubles per further failure, but never waits
/// longer than one sync interval.
pub fn retry_delay_secs(consecutive_failures: usize, interval_secs: u64) -> i64 {
    if consecutive_failures == 0 {
        return 0;
    }
    let doublings = u32::try_from(consecutive_failures - 1)
        .unwrap_or(MAX_DOUBLINGS)
        .min(MAX_DOUBLINGS);
    let interval = i64::try_from(interval_secs).unwrap_or(i64::MAX);
    (FIRST_RETRY_DELAY_SECS << doublings).min(interval)
}
