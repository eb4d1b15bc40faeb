//! Folds raw step samples into per-bucket sums.

use crate::errors::{Error, Result};

use super::sync_model::{AggregatedBuckets, BucketGranularity, RawSample, SyncCursor};

/// Output of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationResult {
    pub buckets: AggregatedBuckets,
    /// Latest sample end time, never earlier than the previous cursor.
    pub max_end_time_seen: SyncCursor,
    pub sample_count: usize,
}

/// Sums `samples` into buckets of `granularity` and tracks the latest end time.
///
/// With no samples the buckets are empty and `max_end_time_seen` is `previous`.
/// Fails when a bucket sum or the pass total does not fit in an `i64`.
pub fn aggregate_samples<'a, I>(
    samples: I,
    previous: SyncCursor,
    granularity: BucketGranularity,
) -> Result<AggregationResult>
where
    I: IntoIterator<Item = &'a RawSample>,
{
    let mut result = AggregationResult {
        buckets: AggregatedBuckets::new(),
        max_end_time_seen: previous,
        sample_count: 0,
    };
    let mut total: i64 = 0;

    for sample in samples {
        total = total.checked_add(sample.value).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Step total overflows after {} samples",
                result.sample_count
            ))
        })?;
        result
            .buckets
            .add(granularity.bucket_key(sample.end_time), sample.value)?;
        let seen = SyncCursor::new(sample.end_time);
        if seen > result.max_end_time_seen {
            result.max_end_time_seen = seen;
        }
        result.sample_count += 1;
    }

    Ok(result)
}
