//! Telemetry service: ingestion, latest values and read queries.
//!
//! Shared by the HTTP handlers, the MQTT ingestor and the averaging worker
//! behind an `Arc`.

use crate::aggregate::{bucketize, resolve_window_average, rolling_mean, AggregationWindow, BucketAverage, GapFill};
use crate::error::{TelemetryError, TelemetryResult};
use crate::store::ReadingStore;
use crate::types::{AverageRecord, LatestValues, NewReading, Reading, ReadingKind, StoreCounts, StoredAverage};
use chrono::{DateTime, Duration, Utc};
use observability::TelemetryMetrics;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestSource {
    Http,
    Mqtt,
}

impl IngestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestSource::Http => "http",
            IngestSource::Mqtt => "mqtt",
        }
    }
}

impl fmt::Display for IngestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ingestion and query service over a [`ReadingStore`].
pub struct TelemetryService {
    store: Arc<dyn ReadingStore>,
    latest: RwLock<LatestValues>,
    metrics: TelemetryMetrics,
}

impl TelemetryService {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self {
            store,
            latest: RwLock::new(LatestValues::default()),
            metrics: TelemetryMetrics::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    pub fn metrics(&self) -> &TelemetryMetrics {
        &self.metrics
    }

    /// Store a reading and make it the latest value of its kind.
    ///
    /// The latest value only changes once the row is persisted.
    #[instrument(skip(self), fields(kind = %reading.kind, source = %source))]
    pub async fn ingest(&self, reading: NewReading, source: IngestSource) -> TelemetryResult<i64> {
        if !reading.value.is_finite() {
            let err = TelemetryError::InvalidValue(reading.value);
            self.metrics.reading_rejected(err.reason());
            return Err(err);
        }

        match self.store.insert_reading(reading).await {
            Ok(id) => {
                self.latest.write().record(&reading);
                self.metrics
                    .reading_ingested(reading.kind.as_db_str(), source.as_str(), reading.value);
                debug!(id, value = reading.value, "Reading stored");
                Ok(id)
            }
            Err(e) => {
                error!(error = %e, "Error storing data");
                self.metrics.reading_rejected(e.reason());
                Err(e)
            }
        }
    }

    /// Count a reading that failed validation before reaching [`ingest`](Self::ingest).
    pub fn record_rejection(&self, err: &TelemetryError) {
        self.metrics.reading_rejected(err.reason());
    }

    /// Load the newest stored reading of each kind into the latest values.
    ///
    /// Values already recorded in memory are kept if they are newer.
    pub async fn seed_latest(&self) -> TelemetryResult<LatestValues> {
        for kind in ReadingKind::ALL {
            if let Some(reading) = self.store.latest_reading(kind).await? {
                let mut latest = self.latest.write();
                let newer_in_memory = latest
                    .get(kind)
                    .map(|v| v.timestamp >= reading.timestamp)
                    .unwrap_or(false);
                if !newer_in_memory {
                    latest.record(&NewReading {
                        kind,
                        value: reading.value,
                        timestamp: reading.timestamp,
                    });
                }
            }
        }

        let snapshot = self.latest();
        info!(
            temperature = ?snapshot.temperature.map(|v| v.value),
            humidity = ?snapshot.humidity.map(|v| v.value),
            "Latest values seeded from store"
        );
        Ok(snapshot)
    }

    /// Snapshot of the latest values.
    pub fn latest(&self) -> LatestValues {
        *self.latest.read()
    }

    /// Newest `limit` averages, oldest first.
    pub async fn history(&self, limit: usize) -> TelemetryResult<Vec<StoredAverage>> {
        self.store.recent_averages(limit).await
    }

    /// Raw readings with `timestamp >= now - lookback`, oldest first.
    pub async fn raw_since(&self, now: DateTime<Utc>, lookback: Duration) -> TelemetryResult<Vec<Reading>> {
        self.store.readings_since(now - lookback).await
    }

    /// Bucketed averages over `[now - lookback, now]`, computed from raw readings.
    ///
    /// `smooth` > 1 applies a trailing rolling mean across that many buckets.
    #[instrument(skip(self))]
    pub async fn series(
        &self,
        now: DateTime<Utc>,
        window: AggregationWindow,
        lookback: Duration,
        gap_fill: GapFill,
        smooth: usize,
    ) -> TelemetryResult<Vec<BucketAverage>> {
        let from = now - lookback;
        let readings = self.store.readings_between(from, now).await?;
        let buckets = bucketize(&readings, window, from, now, gap_fill)?;
        Ok(rolling_mean(&buckets, smooth))
    }

    /// Trailing-window means at `now`, falling back to the latest values.
    ///
    /// Returns `None` when neither kind has anything to report.
    #[instrument(skip(self))]
    pub async fn compute_window_average(
        &self,
        now: DateTime<Utc>,
        window: AggregationWindow,
    ) -> TelemetryResult<Option<AverageRecord>> {
        let from = now - window.duration();
        let avg_temperature = self
            .store
            .average_between(ReadingKind::Temperature, from, now)
            .await?;
        let avg_humidity = self
            .store
            .average_between(ReadingKind::Humidity, from, now)
            .await?;

        if avg_temperature.is_none() || avg_humidity.is_none() {
            debug!(
                window = %window,
                temperature_in_window = avg_temperature.is_some(),
                humidity_in_window = avg_humidity.is_some(),
                "Falling back to latest values"
            );
        }

        Ok(resolve_window_average(avg_temperature, avg_humidity, &self.latest(), now))
    }

    /// Persist an average row.
    pub async fn store_average(&self, record: AverageRecord) -> TelemetryResult<i64> {
        match self.store.insert_average(record).await {
            Ok(id) => {
                self.metrics.average_stored();
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, "Error storing average data");
                Err(e)
            }
        }
    }

    pub async fn counts(&self) -> TelemetryResult<StoreCounts> {
        self.store.counts().await
    }
}

impl fmt::Debug for TelemetryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryService")
            .field("latest", &self.latest())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryReadingStore;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn service() -> TelemetryService {
        TelemetryService::new(Arc::new(InMemoryReadingStore::new()))
    }

    fn at(kind: ReadingKind, value: f64, seconds_offset: i64) -> NewReading {
        NewReading::new(kind, value, t0() + Duration::seconds(seconds_offset)).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_updates_latest() {
        let service = service();
        let id = service
            .ingest(at(ReadingKind::Temperature, 21.0, 0), IngestSource::Http)
            .await
            .unwrap();
        assert_eq!(id, 1);

        let latest = service.latest();
        assert_eq!(latest.temperature.map(|v| v.value), Some(21.0));
        assert!(latest.humidity.is_none());
        assert_eq!(service.counts().await.unwrap().raw_readings, 1);
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_finite() {
        let service = service();
        let reading = NewReading {
            kind: ReadingKind::Humidity,
            value: f64::NAN,
            timestamp: t0(),
        };
        let err = service.ingest(reading, IngestSource::Mqtt).await.unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidValue(_)));
        assert!(service.latest().is_empty());
    }

    #[tokio::test]
    async fn test_seed_latest_from_store() {
        let store = Arc::new(InMemoryReadingStore::new());
        store.insert_reading(at(ReadingKind::Humidity, 40.0, 0)).await.unwrap();
        store.insert_reading(at(ReadingKind::Humidity, 42.0, 60)).await.unwrap();

        let service = TelemetryService::new(store);
        let seeded = service.seed_latest().await.unwrap();
        assert_eq!(seeded.humidity.map(|v| v.value), Some(42.0));
        assert!(seeded.temperature.is_none());
    }

    #[tokio::test]
    async fn test_window_average_falls_back_to_latest() {
        let service = service();
        // Humidity only outside the window
        service
            .ingest(at(ReadingKind::Humidity, 55.0, -3_600), IngestSource::Http)
            .await
            .unwrap();
        service
            .ingest(at(ReadingKind::Temperature, 20.0, -60), IngestSource::Http)
            .await
            .unwrap();
        service
            .ingest(at(ReadingKind::Temperature, 22.0, -30), IngestSource::Http)
            .await
            .unwrap();

        let record = service
            .compute_window_average(t0(), AggregationWindow::FIVE_MINUTES)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.avg_temperature, Some(21.0));
        assert_eq!(record.avg_humidity, Some(55.0));
        assert_eq!(record.timestamp, t0());
    }

    #[tokio::test]
    async fn test_window_average_empty() {
        let service = service();
        let record = service
            .compute_window_average(t0(), AggregationWindow::FIVE_MINUTES)
            .await
            .unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_series_and_raw_since() {
        let service = service();
        for (value, offset) in [(10.0, -170), (12.0, -160), (30.0, -50)] {
            service
                .ingest(at(ReadingKind::Temperature, value, offset), IngestSource::Http)
                .await
                .unwrap();
        }

        let series = service
            .series(
                t0(),
                AggregationWindow::ONE_MINUTE,
                Duration::minutes(3),
                GapFill::Null,
                0,
            )
            .await
            .unwrap();
        // Buckets 11:57, 11:58, 11:59 and 12:00
        assert_eq!(series.len(), 4);
        assert_eq!(series[0].avg_temperature, Some(11.0));
        assert_eq!(series[1].avg_temperature, None);
        assert_eq!(series[2].avg_temperature, Some(30.0));

        let raw = service.raw_since(t0(), Duration::minutes(1)).await.unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].value, 30.0);
    }
}
