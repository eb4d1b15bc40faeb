//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context};
use stepsync_core::sync::{BucketGranularity, SYNC_INTERVAL_SECS};
use stepsync_google_fit::{GoogleFitConfig, DEFAULT_FITNESS_API_URL, DEFAULT_TOKEN_URL};
use stepsync_oneself::{OneselfConfig, DEFAULT_ONESELF_API_URL};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8088";
const DEFAULT_DATABASE_PATH: &str = "data/stepsync.db";
const DEFAULT_PUBLIC_HOST: &str = "http://localhost:8088";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_path: String,
    /// Public base URL 1self uses to reach the sync callback.
    pub public_host: String,
    pub sync_interval: Duration,
    pub granularity: BucketGranularity,
    pub scheduler_autostart: bool,
    pub google: GoogleFitConfig,
    pub oneself: OneselfConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let url = |name: &str, default: &str| {
            value(name)
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| default.to_string())
        };
        let required = |name: &str| value(name).ok_or_else(|| anyhow!("{} must be set", name));

        let bind_addr = value("STEPSYNC_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("STEPSYNC_BIND_ADDR is not a socket address")?;

        let sync_interval_secs = match value("STEPSYNC_SYNC_INTERVAL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| anyhow!("STEPSYNC_SYNC_INTERVAL_SECS must be a positive integer"))?,
            None => SYNC_INTERVAL_SECS,
        };

        let granularity = match value("STEPSYNC_BUCKET_GRANULARITY") {
            Some(raw) => raw.parse::<BucketGranularity>()?,
            None => BucketGranularity::default(),
        };

        let scheduler_autostart = match value("STEPSYNC_SCHEDULER_AUTOSTART") {
            Some(raw) => matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            None => true,
        };

        let google = GoogleFitConfig::new(
            required("GOOGLE_CLIENT_ID")?,
            required("GOOGLE_CLIENT_SECRET")?,
        )
        .with_api_base_url(url("GOOGLE_FIT_API_URL", DEFAULT_FITNESS_API_URL))
        .with_token_url(url("GOOGLE_TOKEN_URL", DEFAULT_TOKEN_URL));

        let oneself = OneselfConfig::new(
            required("ONESELF_APP_ID")?,
            required("ONESELF_APP_SECRET")?,
        )
        .with_api_base_url(url("ONESELF_API_URL", DEFAULT_ONESELF_API_URL));

        Ok(Self {
            bind_addr,
            database_path: value("STEPSYNC_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            public_host: url("STEPSYNC_HOST", DEFAULT_PUBLIC_HOST),
            sync_interval: Duration::from_secs(sync_interval_secs),
            granularity,
            scheduler_autostart,
            google,
            oneself,
        })
    }
}
