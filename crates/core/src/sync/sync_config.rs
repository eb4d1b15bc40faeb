//! Engine configuration passed explicitly to the orchestrator.

use chrono::{DateTime, Duration, Utc};

use crate::errors::{Error, Result};

use super::sync_model::BucketGranularity;
use super::sync_window::{default_horizon, default_window_epsilon};

/// Name the lifecycle events report as their source.
pub const DEFAULT_SOURCE_NAME: &str = "google-fit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Exclusive upper bound of every fetch window.
    pub horizon: DateTime<Utc>,
    /// Offset added to the cursor to skip the already-counted sample.
    pub window_epsilon: Duration,
    pub granularity: BucketGranularity,
    pub source_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            window_epsilon: default_window_epsilon(),
            granularity: BucketGranularity::Hour,
            source_name: DEFAULT_SOURCE_NAME.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn with_granularity(mut self, granularity: BucketGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_horizon(mut self, horizon: DateTime<Utc>) -> Self {
        self.horizon = horizon;
        self
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window_epsilon <= Duration::zero() {
            return Err(Error::Config(
                "window epsilon must be strictly positive".to_string(),
            ));
        }
        if self.horizon <= Utc::now() {
            return Err(Error::Config(format!(
                "fetch horizon {} is not in the future",
                self.horizon.to_rfc3339()
            )));
        }
        if self.source_name.trim().is_empty() {
            return Err(Error::Config("source name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SyncConfig::default().validate().expect("valid default");
    }

    #[test]
    fn zero_epsilon_is_rejected() {
        let config = SyncConfig {
            window_epsilon: Duration::zero(),
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn past_horizon_is_rejected() {
        let config = SyncConfig::default().with_horizon(Utc::now() - Duration::days(1));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
