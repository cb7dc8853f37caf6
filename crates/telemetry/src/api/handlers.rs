//! HTTP request handlers for the weather API.

use crate::aggregate::{AggregationWindow, GapFill};
use crate::api::models::*;
use crate::error::TelemetryError;
use crate::service::{IngestSource, TelemetryService};
use crate::types::{format_timestamp, parse_timestamp, LatestValues, NewReading, ReadingKind};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use config::AggregationConfig;
use std::sync::Arc;
use tracing::warn;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Defaults and caps for the read endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApiSettings {
    pub history_limit: usize,
    pub history_max: usize,
    pub raw_lookback_minutes: u64,
    pub series_window: AggregationWindow,
    pub series_lookback_minutes: u64,
}

impl ApiSettings {
    pub fn from_config(config: &AggregationConfig) -> Result<Self, TelemetryError> {
        Ok(Self {
            history_limit: config.history_limit.max(1),
            history_max: config.history_max.max(1),
            raw_lookback_minutes: config.raw_lookback_minutes,
            series_window: AggregationWindow::parse(&config.window)?,
            series_lookback_minutes: 60,
        })
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            history_limit: 12,
            history_max: 1000,
            raw_lookback_minutes: 45,
            series_window: AggregationWindow::FIVE_MINUTES,
            series_lookback_minutes: 60,
        }
    }
}

/// Shared state for weather API handlers.
pub struct WeatherApiState {
    pub service: Arc<TelemetryService>,
    pub settings: ApiSettings,
}

impl WeatherApiState {
    pub fn new(service: Arc<TelemetryService>, settings: ApiSettings) -> Self {
        Self { service, settings }
    }
}

fn error_response(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
        }),
    )
}

/// 400 for bad input, 500 for everything else.
fn telemetry_error(err: TelemetryError, context: &str) -> ApiError {
    if err.is_client_error() {
        error_response(StatusCode::BAD_REQUEST, err.to_string())
    } else {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}: {}", context, err),
        )
    }
}

/// POST /api/weather/data
pub async fn submit_reading(
    State(state): State<Arc<WeatherApiState>>,
    payload: Result<Json<SubmitReadingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitReadingResponse>), ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        state
            .service
            .record_rejection(&TelemetryError::MissingField("body"));
        error_response(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;

    let (Some(kind), Some(value)) = (request.kind.as_deref(), request.value) else {
        state
            .service
            .record_rejection(&TelemetryError::MissingField("type/value"));
        return Err(error_response(StatusCode::BAD_REQUEST, "Missing required fields"));
    };

    let reading = parse_request(kind, value, request.timestamp.as_deref()).map_err(|e| {
        warn!(error = %e, "Rejected reading");
        state.service.record_rejection(&e);
        telemetry_error(e, "Failed to store data")
    })?;

    let id = state
        .service
        .ingest(reading, IngestSource::Http)
        .await
        .map_err(|e| telemetry_error(e, "Failed to store data"))?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitReadingResponse {
            message: "Data stored successfully".to_string(),
            id,
        }),
    ))
}

fn parse_request(kind: &str, value: f64, timestamp: Option<&str>) -> Result<NewReading, TelemetryError> {
    let kind = ReadingKind::parse(kind)?;
    let timestamp = match timestamp.map(str::trim).filter(|s| !s.is_empty()) {
        Some(ts) => parse_timestamp(ts)?,
        None => Utc::now(),
    };
    NewReading::new(kind, value, timestamp)
}

/// GET /api/weather/history
pub async fn get_history(
    State(state): State<Arc<WeatherApiState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<AverageResponse>>, ApiError> {
    let settings = &state.settings;
    let limit = params
        .limit
        .unwrap_or(settings.history_limit)
        .clamp(1, settings.history_max);

    let rows = state
        .service
        .history(limit)
        .await
        .map_err(|e| telemetry_error(e, "Failed to fetch historical data"))?;

    Ok(Json(rows.iter().map(AverageResponse::from).collect()))
}

/// GET /api/weather/historical
pub async fn get_historical(
    State(state): State<Arc<WeatherApiState>>,
    Query(params): Query<HistoricalParams>,
) -> Result<Json<Vec<RawReadingResponse>>, ApiError> {
    let minutes = params.minutes.unwrap_or(state.settings.raw_lookback_minutes);
    let lookback = lookback_minutes(minutes)?;

    let rows = state
        .service
        .raw_since(Utc::now(), lookback)
        .await
        .map_err(|e| telemetry_error(e, "Failed to fetch historical data"))?;

    Ok(Json(rows.iter().map(RawReadingResponse::from).collect()))
}

fn lookback_minutes(minutes: u64) -> Result<Duration, ApiError> {
    // Ten years is far past anything stored; larger values would overflow
    const MAX_MINUTES: u64 = 10 * 366 * 24 * 60;
    if minutes == 0 || minutes > MAX_MINUTES {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("minutes must be between 1 and {}", MAX_MINUTES),
        ));
    }
    Ok(Duration::minutes(minutes as i64))
}

/// GET /api/weather/latest
pub async fn get_latest(State(state): State<Arc<WeatherApiState>>) -> Json<LatestValues> {
    Json(state.service.latest())
}

/// GET /api/weather/series
pub async fn get_series(
    State(state): State<Arc<WeatherApiState>>,
    Query(params): Query<SeriesParams>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let window = match params.window.as_deref() {
        Some(w) => AggregationWindow::parse(w).map_err(|e| telemetry_error(e, "Invalid window"))?,
        None => state.settings.series_window,
    };
    let fill = match params.fill.as_deref() {
        Some(f) => GapFill::parse(f).map_err(|e| telemetry_error(e, "Invalid fill"))?,
        None => GapFill::default(),
    };
    let lookback = lookback_minutes(
        params
            .minutes
            .unwrap_or(state.settings.series_lookback_minutes),
    )?;

    let now = Utc::now();
    let buckets = state
        .service
        .series(now, window, lookback, fill, params.smooth)
        .await
        .map_err(|e| telemetry_error(e, "Failed to compute series"))?;

    Ok(Json(SeriesResponse {
        success: true,
        window: window.as_str(),
        fill: fill.as_str().to_string(),
        smooth: params.smooth,
        from: format_timestamp(now - lookback),
        to: format_timestamp(now),
        bucket_count: buckets.len(),
        buckets,
    }))
}

/// GET /api/weather/stats
pub async fn get_stats(
    State(state): State<Arc<WeatherApiState>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let counts = state
        .service
        .counts()
        .await
        .map_err(|e| telemetry_error(e, "Failed to fetch stats"))?;

    Ok(Json(StatsResponse {
        success: true,
        raw_readings: counts.raw_readings,
        averages: counts.averages,
        latest: state.service.latest(),
    }))
}
