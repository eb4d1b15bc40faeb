//! HTTP client for the Google Fit REST API.

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use stepsync_core::errors::FetchError;
use stepsync_core::sync::{Credential, FetchWindow, RawSample, SampleSource};

use crate::error::{GoogleFitError, Result};
use crate::types::{ApiErrorResponse, Dataset, OAuthErrorResponse, TokenResponse};

pub const DEFAULT_FITNESS_API_URL: &str = "https://www.googleapis.com/fitness/v1";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Merged step deltas across every device of the user.
pub const DEFAULT_STEP_DATA_SOURCE: &str =
    "derived:com.google.step_count.delta:com.google.android.gms:estimated_steps";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Seconds before actual expiry to treat a cached token as expired.
const TOKEN_EXPIRY_BUFFER_SECS: u64 = 60;
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct GoogleFitConfig {
    pub api_base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub data_source_id: String,
    pub timeout: Duration,
}

impl GoogleFitConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            api_base_url: DEFAULT_FITNESS_API_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            data_source_id: DEFAULT_STEP_DATA_SOURCE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

#[derive(Debug, Clone)]
struct CachedAccessToken {
    token: String,
    expires_at: Instant,
}

/// Google Fit client. Access tokens are cached per refresh token.
pub struct GoogleFitClient {
    client: reqwest::Client,
    config: GoogleFitConfig,
    token_cache: RwLock<HashMap<String, CachedAccessToken>>,
    rotated_refresh_tokens: Mutex<HashMap<String, String>>,
}

impl GoogleFitClient {
    pub fn new(config: GoogleFitConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config,
            token_cache: RwLock::new(HashMap::new()),
            rotated_refresh_tokens: Mutex::new(HashMap::new()),
        }
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[GoogleFit] API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[GoogleFit] API response error ({}): {}", status, preview);
    }

    /// Returns a valid access token for `refresh_token`, exchanging it if the
    /// cached one is missing or about to expire.
    ///
    /// The write lock is held across the exchange so concurrent callers do not
    /// refresh the same token twice.
    pub async fn access_token(&self, refresh_token: &str) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.get(refresh_token) {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut cache = self.token_cache.write().await;
        if let Some(cached) = cache.get(refresh_token) {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let token_response = self.exchange_refresh_token(refresh_token).await?;

        if let Some(rotated) = token_response
            .refresh_token
            .as_deref()
            .filter(|rotated| !rotated.is_empty() && *rotated != refresh_token)
        {
            debug!("[GoogleFit] Token endpoint rotated the refresh token");
            self.rotated_refresh_tokens
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(refresh_token.to_string(), rotated.to_string());
        }

        let ttl = token_response
            .expires_in
            .map(|secs| secs.max(0) as u64)
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
            .saturating_sub(TOKEN_EXPIRY_BUFFER_SECS);
        cache.insert(
            refresh_token.to_string(),
            CachedAccessToken {
                token: token_response.access_token.clone(),
                expires_at: Instant::now() + Duration::from_secs(ttl),
            },
        );

        debug!("[GoogleFit] Access token refreshed and cached (TTL {}s)", ttl);
        Ok(token_response.access_token)
    }

    async fn invalidate_access_token(&self, refresh_token: &str) {
        self.token_cache.write().await.remove(refresh_token);
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        debug!("[GoogleFit] Exchanging refresh token");
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            let oauth_error = serde_json::from_str::<OAuthErrorResponse>(&body).ok();
            let code = oauth_error.as_ref().and_then(|e| e.error.clone());
            let message = oauth_error
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| format!("Token refresh failed: {}", body));

            if status.as_u16() == 401 || code.as_deref() == Some("invalid_grant") {
                warn!("[GoogleFit] Refresh token rejected: {}", message);
                return Err(GoogleFitError::unauthorized(message));
            }
            error!(
                "[GoogleFit] Token refresh failed with status {}: {}",
                status, message
            );
            return Err(GoogleFitError::api(status.as_u16(), message));
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn headers(&self, access_token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|_| GoogleFitError::unauthorized("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);
        Ok(headers)
    }

    fn dataset_url(&self, window: &FetchWindow) -> String {
        format!(
            "{}/users/me/dataSources/{}/datasets/{}",
            self.config.api_base_url,
            urlencoding::encode(&self.config.data_source_id),
            window.dataset_id()
        )
    }

    /// Reads the step dataset covering `window`.
    pub async fn get_dataset(&self, access_token: &str, window: &FetchWindow) -> Result<Dataset> {
        let url = self.dataset_url(window);
        debug!("[GoogleFit] GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(access_token)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| format!("Request failed: {}", body));
            return Err(GoogleFitError::api(status.as_u16(), message));
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_window(&self, refresh_token: &str, window: &FetchWindow) -> Result<Dataset> {
        let access_token = self.access_token(refresh_token).await?;
        match self.get_dataset(&access_token, window).await {
            Err(err) if err.status_code() == Some(401) => {
                // Cached token revoked early; retry once with a fresh one.
                warn!("[GoogleFit] Access token rejected, refreshing and retrying once");
                self.invalidate_access_token(refresh_token).await;
                let access_token = self.access_token(refresh_token).await?;
                self.get_dataset(&access_token, window).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl SampleSource for GoogleFitClient {
    async fn fetch_samples(
        &self,
        credential: &Credential,
        window: &FetchWindow,
    ) -> std::result::Result<Vec<RawSample>, FetchError> {
        let dataset = self
            .fetch_window(&credential.refresh_token, window)
            .await
            .map_err(FetchError::from)?;
        let samples = dataset.into_samples().map_err(FetchError::from)?;
        debug!(
            "[GoogleFit] Dataset {} returned {} samples",
            window.dataset_id(),
            samples.len()
        );
        Ok(samples)
    }

    fn take_rotated_refresh_token(&self, credential: &Credential) -> Option<String> {
        self.rotated_refresh_tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&credential.refresh_token)
    }
}
