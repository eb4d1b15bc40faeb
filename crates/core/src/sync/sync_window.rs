//! Fetch window derivation for incremental sync.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::sync_model::{timestamp_nanos, SyncCursor};

/// Offset added to the cursor so the sample that produced it is not fetched again.
/// Matches the upstream API's effective millisecond resolution.
pub const WINDOW_EPSILON_NANOS: i64 = 1_000_000;

/// Far-future upper bound for every fetch (2034-03-11T04:56:40Z).
pub const DEFAULT_HORIZON_NANOS: i64 = 2_025_716_200_000_000_000;

pub fn default_window_epsilon() -> Duration {
    Duration::nanoseconds(WINDOW_EPSILON_NANOS)
}

pub fn default_horizon() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_nanos(DEFAULT_HORIZON_NANOS)
}

/// Half-open interval `[from, horizon)` requested from the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchWindow {
    pub from: DateTime<Utc>,
    pub horizon: DateTime<Utc>,
}

impl FetchWindow {
    pub fn contains(&self, value: DateTime<Utc>) -> bool {
        value >= self.from && value < self.horizon
    }

    /// True when the cursor has already reached the horizon.
    pub fn is_empty(&self) -> bool {
        self.from >= self.horizon
    }

    pub fn from_nanos(&self) -> i64 {
        timestamp_nanos(&self.from)
    }

    pub fn horizon_nanos(&self) -> i64 {
        timestamp_nanos(&self.horizon)
    }

    /// Dataset identifier in the upstream `"{start_ns}-{end_ns}"` form.
    pub fn dataset_id(&self) -> String {
        format!("{}-{}", self.from_nanos(), self.horizon_nanos())
    }
}

/// Derives the window for the next fetch: `[cursor + epsilon, horizon)`.
///
/// `from` is clamped to `horizon`, so a cursor at or beyond the horizon yields
/// an empty window instead of an inverted one.
pub fn compute_fetch_window(
    cursor: &SyncCursor,
    horizon: DateTime<Utc>,
    epsilon: Duration,
) -> FetchWindow {
    let from = cursor
        .last_processed_time
        .checked_add_signed(epsilon)
        .unwrap_or(horizon)
        .min(horizon);
    FetchWindow { from, horizon }
}
