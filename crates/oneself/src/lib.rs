//! 1self API client: stream registration and event batches.
//!
//! [`OneselfClient`] implements the core `EventSink` contract. Aggregated step
//! buckets become `steps`/`walked` events; sync lifecycle markers become
//! `1self`/`integration`/`sync` events.

mod client;
mod error;
mod types;

pub use client::{OneselfClient, OneselfConfig, DEFAULT_ONESELF_API_URL};
pub use error::{OneselfError, Result};
pub use types::*;
