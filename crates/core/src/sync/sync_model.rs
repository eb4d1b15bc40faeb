//! Step sync domain models.

use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

/// Persisted watermark: end time of the last sample that was aggregated and
/// forwarded for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    pub last_processed_time: DateTime<Utc>,
}

impl SyncCursor {
    pub fn new(last_processed_time: DateTime<Utc>) -> Self {
        Self {
            last_processed_time,
        }
    }

    /// Cursor of an account that has never synced.
    pub fn epoch() -> Self {
        Self::from_nanos(0)
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self::new(DateTime::<Utc>::from_timestamp_nanos(nanos))
    }

    /// Nanoseconds since the Unix epoch, saturating for dates past 2262.
    pub fn as_nanos(&self) -> i64 {
        timestamp_nanos(&self.last_processed_time)
    }

    pub fn is_epoch(&self) -> bool {
        self.as_nanos() == 0
    }
}

impl Default for SyncCursor {
    fn default() -> Self {
        Self::epoch()
    }
}

impl fmt::Display for SyncCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(
            &self
                .last_processed_time
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )
    }
}

pub(crate) fn timestamp_nanos(value: &DateTime<Utc>) -> i64 {
    value.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// One step-count delta reported by the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSample {
    pub end_time: DateTime<Utc>,
    pub value: i64,
}

impl RawSample {
    pub fn new(end_time: DateTime<Utc>, value: i64) -> Self {
        Self { end_time, value }
    }
}

/// Size of the time interval samples are summed into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketGranularity {
    #[default]
    Hour,
    Day,
}

impl BucketGranularity {
    /// Start of the bucket containing `value`.
    pub fn truncate(&self, value: DateTime<Utc>) -> DateTime<Utc> {
        let hour = match self {
            BucketGranularity::Hour => value.hour(),
            BucketGranularity::Day => 0,
        };
        Utc.with_ymd_and_hms(value.year(), value.month(), value.day(), hour, 0, 0)
            .single()
            .unwrap_or(value)
    }

    /// Stable string key for the bucket containing `value`, e.g. `2024-01-01T05:00:00Z`.
    pub fn bucket_key(&self, value: DateTime<Utc>) -> String {
        self.truncate(value)
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketGranularity::Hour => "hour",
            BucketGranularity::Day => "day",
        }
    }
}

impl FromStr for BucketGranularity {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hour" | "hourly" => Ok(BucketGranularity::Hour),
            "day" | "daily" => Ok(BucketGranularity::Day),
            other => Err(Error::Config(format!(
                "Unsupported bucket granularity '{}'",
                other
            ))),
        }
    }
}

/// Per-bucket step sums produced by one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatedBuckets(BTreeMap<String, i64>);

impl AggregatedBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to the bucket at `key`, starting from zero for a new key.
    ///
    /// The bucket is left untouched when the sum does not fit in an `i64`.
    pub fn add(&mut self, key: impl Into<String>, value: i64) -> Result<(), Error> {
        let key = key.into();
        let current = self.0.get(&key).copied().unwrap_or(0);
        let sum = current.checked_add(value).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Step sum overflows bucket {}: {} + {}",
                key, current, value
            ))
        })?;
        self.0.insert(key, sum);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.0.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum over every bucket, saturating at `i64::MAX`.
    pub fn total(&self) -> i64 {
        self.0
            .values()
            .fold(0_i64, |acc, value| acc.saturating_add(*value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &i64)> {
        self.0.iter()
    }
}

impl FromIterator<(String, i64)> for AggregatedBuckets {
    fn from_iter<T: IntoIterator<Item = (String, i64)>>(iter: T) -> Self {
        let mut buckets = AggregatedBuckets::new();
        for (key, value) in iter {
            let slot = buckets.0.entry(key).or_insert(0);
            *slot = slot.saturating_add(value);
        }
        buckets
    }
}

/// Retry policy classification for sync failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Failure kinds a sync attempt can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Credential rejected upstream; needs re-authorization.
    Auth,
    /// Any other fetch failure; retried at the next scheduled sync.
    Transient,
    /// Downstream sink unavailable; cursor deliberately not advanced.
    ForwardFailure,
}

impl SyncErrorKind {
    /// Code carried by the downstream error event.
    pub fn code(&self) -> u16 {
        match self {
            SyncErrorKind::Auth => 401,
            SyncErrorKind::Transient => 503,
            SyncErrorKind::ForwardFailure => 500,
        }
    }

    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            SyncErrorKind::Auth => SyncRetryClass::ReauthRequired,
            SyncErrorKind::Transient | SyncErrorKind::ForwardFailure => SyncRetryClass::Retryable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncErrorKind::Auth => "auth",
            SyncErrorKind::Transient => "transient",
            SyncErrorKind::ForwardFailure => "forward_failure",
        }
    }
}

impl FromStr for SyncErrorKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "auth" => Ok(SyncErrorKind::Auth),
            "transient" => Ok(SyncErrorKind::Transient),
            "forward_failure" => Ok(SyncErrorKind::ForwardFailure),
            other => Err(Error::InvalidInput(format!(
                "Unknown sync error kind '{}'",
                other
            ))),
        }
    }
}

/// Result of the fetch + aggregate part of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        buckets: AggregatedBuckets,
        new_cursor: SyncCursor,
    },
    AuthError,
    TransientError { cause: String },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success { .. })
    }
}

/// Lifecycle marker describing the sync attempt itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Start,
    Complete { buckets: AggregatedBuckets },
    Error { kind: SyncErrorKind },
}

impl SyncEvent {
    pub fn kind(&self) -> SyncEventKind {
        match self {
            SyncEvent::Start => SyncEventKind::Start,
            SyncEvent::Complete { .. } => SyncEventKind::Complete,
            SyncEvent::Error { .. } => SyncEventKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventKind {
    Start,
    Complete,
    Error,
}

impl SyncEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEventKind::Start => "start",
            SyncEventKind::Complete => "complete",
            SyncEventKind::Error => "error",
        }
    }
}

/// Orchestrator states. `Failed`, `Completed` and `ForwardFailed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Started,
    Fetching,
    Aggregating,
    Failed,
    Forwarding,
    Completed,
    ForwardFailed,
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncState::Failed | SyncState::Completed | SyncState::ForwardFailed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Started => "started",
            SyncState::Fetching => "fetching",
            SyncState::Aggregating => "aggregating",
            SyncState::Failed => "failed",
            SyncState::Forwarding => "forwarding",
            SyncState::Completed => "completed",
            SyncState::ForwardFailed => "forward_failed",
        }
    }
}

impl FromStr for SyncState {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "idle" => Ok(SyncState::Idle),
            "started" => Ok(SyncState::Started),
            "fetching" => Ok(SyncState::Fetching),
            "aggregating" => Ok(SyncState::Aggregating),
            "failed" => Ok(SyncState::Failed),
            "forwarding" => Ok(SyncState::Forwarding),
            "completed" => Ok(SyncState::Completed),
            "forward_failed" => Ok(SyncState::ForwardFailed),
            other => Err(Error::InvalidInput(format!("Unknown sync state '{}'", other))),
        }
    }
}

/// Upstream credential for one linked account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub refresh_token: String,
    pub access_token: Option<String>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("refresh_token", &"<redacted>")
            .field("has_access_token", &self.access_token.is_some())
            .finish()
    }
}

/// Downstream stream the events of one account are written to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDestination {
    pub stream_id: String,
    pub write_token: String,
}

impl fmt::Debug for StreamDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDestination")
            .field("stream_id", &self.stream_id)
            .field("write_token", &"<redacted>")
            .finish()
    }
}

/// What the caller of one sync attempt gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub account_id: String,
    pub state: SyncState,
    pub outcome: SyncOutcome,
    pub error_kind: Option<SyncErrorKind>,
    pub cursor_before: SyncCursor,
    pub cursor_after: SyncCursor,
    pub events: Vec<SyncEventKind>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl SyncReport {
    pub fn bucket_count(&self) -> usize {
        match &self.outcome {
            SyncOutcome::Success { buckets, .. } => buckets.len(),
            _ => 0,
        }
    }

    pub fn total_steps(&self) -> i64 {
        match &self.outcome {
            SyncOutcome::Success { buckets, .. } => buckets.total(),
            _ => 0,
        }
    }
}

/// Persisted summary of one finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunRecord {
    pub id: String,
    pub account_id: String,
    pub state: SyncState,
    pub error_kind: Option<SyncErrorKind>,
    pub error_message: Option<String>,
    pub cursor_before: SyncCursor,
    pub cursor_after: SyncCursor,
    pub bucket_count: i64,
    pub total_steps: i64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl SyncRunRecord {
    pub fn from_report(report: &SyncReport) -> Self {
        let error_message = match &report.outcome {
            SyncOutcome::TransientError { cause } => Some(cause.clone()),
            SyncOutcome::AuthError => Some("Upstream credential rejected".to_string()),
            SyncOutcome::Success { .. } if report.state == SyncState::ForwardFailed => {
                Some("Downstream forward failed".to_string())
            }
            SyncOutcome::Success { .. } => None,
        };
        // Buckets of a failed forward never reached the stream.
        let (bucket_count, total_steps) = if report.state == SyncState::ForwardFailed {
            (0, 0)
        } else {
            (report.bucket_count() as i64, report.total_steps())
        };
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            account_id: report.account_id.clone(),
            state: report.state,
            error_kind: report.error_kind,
            error_message,
            cursor_before: report.cursor_before,
            cursor_after: report.cursor_after,
            bucket_count,
            total_steps,
            started_at: report.started_at,
            duration_ms: report.duration_ms,
        }
    }
}
