//! HTTP JSON API for weather readings.
//!
//! - `handlers` - Axum handlers and shared state
//! - `routes` - Router construction
//! - `models` - Request/response types

pub mod handlers;
pub mod models;
pub mod routes;

pub use handlers::{ApiSettings, WeatherApiState};
pub use routes::weather_routes;
