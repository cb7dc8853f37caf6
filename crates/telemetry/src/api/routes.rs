//! Axum route definitions for the weather API.

use crate::api::handlers::{self, WeatherApiState};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Create all weather API routes.
///
/// # Routes
///
/// - `POST /api/weather/data` - Store a reading
/// - `GET /api/weather/history?limit=N` - Stored averages, oldest first
/// - `GET /api/weather/historical?minutes=M` - Raw readings of the last M minutes
/// - `GET /api/weather/latest` - Latest value of each kind
/// - `GET /api/weather/series?window=&minutes=&fill=&smooth=` - Bucketed averages
/// - `GET /api/weather/stats` - Row counts and latest values
pub fn weather_routes(state: Arc<WeatherApiState>) -> Router {
    Router::new()
        .route("/api/weather/data", post(handlers::submit_reading))
        .route("/api/weather/history", get(handlers::get_history))
        .route("/api/weather/historical", get(handlers::get_historical))
        .route("/api/weather/latest", get(handlers::get_latest))
        .route("/api/weather/series", get(handlers::get_series))
        .route("/api/weather/stats", get(handlers::get_stats))
        .with_state(state)
}
