//! Wire types for the OAuth token endpoint and the Fitness REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stepsync_core::sync::RawSample;

use crate::error::{GoogleFitError, Result};

/// Successful response of the token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    /// Present only when the provider rotates the refresh token.
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Google API error envelope: `{"error": {"code": 403, "message": "..."}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: Option<u16>,
    pub message: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub data_source_id: Option<String>,
    pub min_start_time_ns: Option<String>,
    pub max_end_time_ns: Option<String>,
    #[serde(default)]
    pub point: Vec<DataPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub start_time_nanos: Option<String>,
    /// Int64 encoded as a JSON string.
    pub end_time_nanos: String,
    pub data_type_name: Option<String>,
    pub origin_data_source_id: Option<String>,
    #[serde(default)]
    pub value: Vec<DataValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValue {
    pub int_val: Option<i64>,
    pub fp_val: Option<f64>,
}

impl DataPoint {
    pub fn end_time(&self) -> Result<DateTime<Utc>> {
        let nanos = self.end_time_nanos.trim().parse::<i64>().map_err(|_| {
            GoogleFitError::InvalidResponse(format!(
                "endTimeNanos '{}' is not an integer",
                self.end_time_nanos
            ))
        })?;
        Ok(DateTime::<Utc>::from_timestamp_nanos(nanos))
    }
}

impl Dataset {
    /// Every integer value of every point, stamped with the point's end time.
    /// Values without `intVal` are not step deltas and are skipped.
    pub fn into_samples(self) -> Result<Vec<RawSample>> {
        let mut samples = Vec::with_capacity(self.point.len());
        for point in self.point {
            let end_time = point.end_time()?;
            samples.extend(
                point
                    .value
                    .iter()
                    .filter_map(|value| value.int_val)
                    .map(|steps| RawSample::new(end_time, steps)),
            );
        }
        Ok(samples)
    }
}
