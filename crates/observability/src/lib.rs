//! Observability for WeatherHub
//!
//! - Structured logging via tracing
//! - Prometheus metrics for ingestion and aggregation
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("weatherhub", "info", LogFormat::Pretty)?;
//! observability::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, TelemetryMetrics};
