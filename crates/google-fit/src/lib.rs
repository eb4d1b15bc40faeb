//! Google Fit client: OAuth refresh-token exchange and step-count dataset reads.
//!
//! [`GoogleFitClient`] implements the core `SampleSource` contract, so the sync
//! engine can pull step deltas without knowing about HTTP.

mod client;
mod error;
mod types;

pub use client::{
    GoogleFitClient, GoogleFitConfig, DEFAULT_FITNESS_API_URL, DEFAULT_STEP_DATA_SOURCE,
    DEFAULT_TOKEN_URL,
};
pub use error::{GoogleFitError, Result};
pub use types::*;
