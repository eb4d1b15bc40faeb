//! Wire types for the 1self API.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stepsync_core::sync::{AggregatedBuckets, SyncEvent};

pub const STEPS_OBJECT_TAG: &str = "steps";
pub const WALKED_ACTION_TAG: &str = "walked";
pub const NUMBER_OF_STEPS_PROPERTY: &str = "numberOfSteps";
pub const LIFECYCLE_OBJECT_TAGS: [&str; 3] = ["1self", "integration", "sync"];

/// One object/action tagged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub object_tags: Vec<String>,
    pub action_tags: Vec<String>,
    pub date_time: String,
    pub properties: Map<String, Value>,
}

impl Event {
    pub fn new(object_tags: &[&str], action_tags: &[&str], date_time: impl Into<String>) -> Self {
        Self {
            object_tags: object_tags.iter().map(|tag| tag.to_string()).collect(),
            action_tags: action_tags.iter().map(|tag| tag.to_string()).collect(),
            date_time: date_time.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// One `steps`/`walked` event per bucket, in bucket-key order.
pub fn bucket_events(buckets: &AggregatedBuckets) -> Vec<Event> {
    buckets
        .iter()
        .map(|(bucket, steps)| {
            Event::new(&[STEPS_OBJECT_TAG], &[WALKED_ACTION_TAG], bucket.clone())
                .with_property(NUMBER_OF_STEPS_PROPERTY, *steps)
        })
        .collect()
}

fn bucket_map(buckets: &AggregatedBuckets) -> Map<String, Value> {
    buckets
        .iter()
        .map(|(bucket, steps)| (bucket.clone(), Value::from(*steps)))
        .collect()
}

/// Lifecycle marker for a sync attempt.
///
/// `complete` carries the bucket count, the step total and the per-bucket
/// sums keyed like the `steps` events; `error` carries the numeric code and
/// the error kind.
pub fn lifecycle_event(event: &SyncEvent, source: &str, at: DateTime<Utc>) -> Event {
    let base = Event::new(
        &LIFECYCLE_OBJECT_TAGS,
        &[event.kind().as_str()],
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
    .with_property("source", source);

    match event {
        SyncEvent::Start => base,
        SyncEvent::Complete { buckets } => base
            .with_property("bucketCount", buckets.len() as i64)
            .with_property("totalSteps", buckets.total())
            .with_property("buckets", bucket_map(buckets)),
        SyncEvent::Error { kind } => base
            .with_property("code", kind.code())
            .with_property("kind", kind.as_str()),
    }
}

/// Stream credentials returned by registration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    #[serde(rename = "streamid")]
    pub id: String,
    #[serde(rename = "readToken")]
    pub read_token: Option<String>,
    #[serde(rename = "writeToken")]
    pub write_token: String,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("write_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStreamRequest {
    pub callback_url: String,
}

/// Callback 1self invokes to request a sync. The double-brace fields are
/// template placeholders filled in by 1self.
pub fn sync_callback_url(host: &str, account_id: &str) -> String {
    format!(
        "{}/sync?uid={}&latestSyncField={{{{latestSyncField}}}}&streamid={{{{streamid}}}}",
        host.trim_end_matches('/'),
        urlencoding::encode(account_id)
    )
}
