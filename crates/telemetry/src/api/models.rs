//! API request/response models.

use crate::aggregate::BucketAverage;
use crate::types::{format_timestamp, LatestValues, Reading, StoredAverage};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/weather/data`.
///
/// Fields are optional so a missing one is reported as a validation error
/// rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct SubmitReadingRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Option<f64>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitReadingResponse {
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Query parameters for `GET /api/weather/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// Query parameters for `GET /api/weather/historical`.
#[derive(Debug, Deserialize)]
pub struct HistoricalParams {
    pub minutes: Option<u64>,
}

/// Query parameters for `GET /api/weather/series`.
#[derive(Debug, Deserialize)]
pub struct SeriesParams {
    pub window: Option<String>,
    pub minutes: Option<u64>,
    pub fill: Option<String>,
    #[serde(default)]
    pub smooth: usize,
}

/// One averaged row in the history response.
#[derive(Debug, Serialize, Deserialize)]
pub struct AverageResponse {
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub timestamp: String,
}

impl From<&StoredAverage> for AverageResponse {
    fn from(a: &StoredAverage) -> Self {
        Self {
            avg_temperature: a.avg_temperature,
            avg_humidity: a.avg_humidity,
            timestamp: format_timestamp(a.timestamp),
        }
    }
}

/// One raw row in the historical response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RawReadingResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub timestamp: String,
}

impl From<&Reading> for RawReadingResponse {
    fn from(r: &Reading) -> Self {
        Self {
            kind: r.kind.as_db_str().to_string(),
            value: r.value,
            timestamp: format_timestamp(r.timestamp),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeriesResponse {
    pub success: bool,
    pub window: String,
    pub fill: String,
    pub smooth: usize,
    pub from: String,
    pub to: String,
    pub bucket_count: usize,
    pub buckets: Vec<BucketAverage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub success: bool,
    pub raw_readings: u64,
    pub averages: u64,
    pub latest: LatestValues,
}
