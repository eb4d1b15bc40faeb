//! HTTP client for the 1self event API.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

use stepsync_core::errors::SinkError;
use stepsync_core::sync::{AggregatedBuckets, EventSink, StreamDestination, SyncEvent};

use crate::error::{OneselfError, Result};
use crate::types::{bucket_events, lifecycle_event, Event, RegisterStreamRequest, Stream};

pub const DEFAULT_ONESELF_API_URL: &str = "http://app-staging.1self.co";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OneselfConfig {
    pub api_base_url: String,
    pub app_id: String,
    pub app_secret: String,
    /// Reported as `source` on lifecycle events.
    pub source_name: String,
    pub timeout: Duration,
}

impl OneselfConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            api_base_url: DEFAULT_ONESELF_API_URL.to_string(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            source_name: stepsync_core::sync::DEFAULT_SOURCE_NAME.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }
}

/// Client for the 1self streams API.
#[derive(Debug, Clone)]
pub struct OneselfClient {
    client: reqwest::Client,
    config: OneselfConfig,
}

impl OneselfClient {
    pub fn new(config: OneselfConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[Oneself] API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[Oneself] API response error ({}): {}", status, preview);
    }

    /// 1self takes the raw token in `Authorization`, without a scheme.
    fn headers(&self, authorization: &str) -> Result<HeaderMap> {
        if authorization.is_empty() {
            return Err(OneselfError::auth("Missing authorization token"));
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_value = HeaderValue::from_str(authorization)
            .map_err(|_| OneselfError::auth("Invalid authorization token format"))?;
        headers.insert(AUTHORIZATION, auth_value);
        Ok(headers)
    }

    async fn check_status(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message.or(e.error))
                .unwrap_or_else(|| format!("Request failed: {}", body));
            return Err(OneselfError::api(status.as_u16(), message));
        }
        Ok(body)
    }

    /// Sends `events` to the stream as one batch. An empty batch sends nothing.
    ///
    /// POST /v1/streams/{streamId}/events/batch
    pub async fn send_batch(
        &self,
        destination: &StreamDestination,
        events: &[Event],
    ) -> Result<()> {
        if events.is_empty() {
            debug!("[Oneself] No events to send to stream {}", destination.stream_id);
            return Ok(());
        }
        if destination.stream_id.trim().is_empty() {
            return Err(OneselfError::invalid_request("Stream id is required"));
        }

        let url = format!(
            "{}/v1/streams/{}/events/batch",
            self.config.api_base_url,
            urlencoding::encode(&destination.stream_id)
        );
        debug!(
            "[Oneself] Sending {} events to stream {}",
            events.len(),
            destination.stream_id
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers(&destination.write_token)?)
            .json(events)
            .send()
            .await?;

        Self::check_status(response).await.map(|_| ())
    }

    /// Registers a stream for `username` whose syncs are triggered through `callback_url`.
    ///
    /// POST /v1/users/{username}/streams
    pub async fn register_stream(
        &self,
        registration_token: &str,
        username: &str,
        callback_url: &str,
    ) -> Result<Stream> {
        if self.config.app_id.is_empty() || self.config.app_secret.is_empty() {
            return Err(OneselfError::auth("1self app id and secret are not configured"));
        }
        if username.trim().is_empty() {
            return Err(OneselfError::invalid_request("Username is required"));
        }

        let url = format!(
            "{}/v1/users/{}/streams",
            self.config.api_base_url,
            urlencoding::encode(username)
        );
        let mut headers =
            self.headers(&format!("{}:{}", self.config.app_id, self.config.app_secret))?;
        let registration = HeaderValue::from_str(registration_token)
            .map_err(|_| OneselfError::invalid_request("Invalid registration token format"))?;
        headers.insert("registration-token", registration);

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&RegisterStreamRequest {
                callback_url: callback_url.to_string(),
            })
            .send()
            .await?;

        let body = Self::check_status(response).await?;
        let stream: Stream = serde_json::from_str(&body)?;
        info!("[Oneself] Registered stream {} for {}", stream.id, username);
        Ok(stream)
    }

    /// Daily step bar chart for the stream.
    pub fn visualization_url(&self, stream_id: &str) -> String {
        format!(
            "{}/v1/streams/{}/events/steps/walked/sum(numberOfSteps)/daily/barchart",
            self.config.api_base_url,
            urlencoding::encode(stream_id)
        )
    }
}

#[async_trait]
impl EventSink for OneselfClient {
    async fn forward_aggregated(
        &self,
        destination: &StreamDestination,
        buckets: &AggregatedBuckets,
    ) -> std::result::Result<(), SinkError> {
        self.send_batch(destination, &bucket_events(buckets))
            .await
            .map_err(SinkError::from)
    }

    async fn emit_lifecycle(
        &self,
        destination: &StreamDestination,
        event: &SyncEvent,
    ) -> std::result::Result<(), SinkError> {
        let event = lifecycle_event(event, &self.config.source_name, Utc::now());
        self.send_batch(destination, std::slice::from_ref(&event))
            .await
            .map_err(SinkError::from)
    }
}
