//! # Telemetry Crate
//!
//! Weather telemetry for WeatherHub: temperature and humidity readings
//! arrive over HTTP or MQTT, are appended to SQLite, and are averaged over
//! fixed time windows.
//!
//! ## Key Components
//!
//! - **Domain Types**: `ReadingKind`, `NewReading`, `Reading`, `AverageRecord`, `LatestValues`
//! - **Aggregation**: epoch-aligned buckets, trailing-window means, gap filling
//! - **Storage**: `ReadingStore` trait with in-memory and SQLite implementations
//! - **Service**: ingestion, latest-value tracking and read queries
//! - **Worker**: periodic trailing-window averages
//! - **API / Viewer**: Axum routers for JSON endpoints and HTML tables
//!
//! ```text
//!   HTTP POST ──┐                     ┌── /api/weather/*
//!               ├─▶ TelemetryService ─┤
//!   MQTT ───────┘        │            └── /db-viewer/*
//!                        ▼
//!                   ReadingStore ◀── AveragingWorker (every check interval)
//!                 raw_data / avg_data
//! ```

pub mod aggregate;
pub mod api;
pub mod db;
pub mod error;
pub mod ingest;
pub mod service;
pub mod store;
pub mod types;
pub mod viewer;
pub mod worker;

pub use aggregate::{AggregationWindow, BucketAverage, GapFill};
pub use api::{weather_routes, ApiSettings, WeatherApiState};
pub use db::SqliteReadingStore;
pub use error::{TelemetryError, TelemetryResult};
pub use service::{IngestSource, TelemetryService};
pub use store::{InMemoryReadingStore, ReadingStore};
pub use types::{
    AverageRecord, LatestValue, LatestValues, NewReading, Reading, ReadingKind, StoreCounts,
    StoredAverage, StoredTable, TableDump,
};
pub use viewer::{viewer_routes, ViewerState};
pub use worker::{AveragingWorker, CycleOutcome, WorkerConfig};

#[cfg(feature = "mqtt")]
pub use ingest::{MqttIngestor, MqttSettings};
