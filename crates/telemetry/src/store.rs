//! Reading storage trait and in-memory implementation.
//!
//! `ReadingStore` abstracts the two append-only tables (`raw_data` and
//! `avg_data`). The SQLite adapter lives in [`crate::db`].

use crate::aggregate::trailing_average;
use crate::error::TelemetryResult;
use crate::types::{
    format_timestamp, AverageRecord, NewReading, Reading, ReadingKind, StoreCounts,
    StoredAverage, StoredTable, TableDump,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Trait for reading storage.
///
/// Ids are assigned by the store and strictly increase in insertion order.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Append a raw reading, returning its id.
    async fn insert_reading(&self, reading: NewReading) -> TelemetryResult<i64>;

    /// Append an average row, returning its id.
    async fn insert_average(&self, record: AverageRecord) -> TelemetryResult<i64>;

    /// Mean value of `kind` over `from < timestamp <= to`, or `None` if empty.
    async fn average_between(
        &self,
        kind: ReadingKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Option<f64>>;

    /// Raw readings with `from <= timestamp <= to`, oldest first.
    async fn readings_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Vec<Reading>>;

    /// The newest `limit` averages, oldest first.
    async fn recent_averages(&self, limit: usize) -> TelemetryResult<Vec<StoredAverage>>;

    /// The most recent reading of `kind`.
    async fn latest_reading(&self, kind: ReadingKind) -> TelemetryResult<Option<Reading>>;

    /// The newest `limit` rows of `table` as stored text, newest first.
    ///
    /// Rows are not converted to domain types, so rows this service would
    /// skip (unknown types, malformed timestamps) are still listed.
    async fn dump_table(&self, table: StoredTable, limit: usize) -> TelemetryResult<TableDump>;

    /// Row counts of both tables.
    async fn counts(&self) -> TelemetryResult<StoreCounts>;

    /// Raw readings with `timestamp >= cutoff`, oldest first.
    async fn readings_since(&self, cutoff: DateTime<Utc>) -> TelemetryResult<Vec<Reading>> {
        self.readings_between(cutoff, DateTime::<Utc>::MAX_UTC).await
    }
}

#[derive(Debug, Default)]
struct Tables {
    readings: Vec<Reading>,
    averages: Vec<StoredAverage>,
    next_reading_id: i64,
    next_average_id: i64,
}

/// In-memory reading store for testing and development.
#[derive(Debug, Default)]
pub struct InMemoryReadingStore {
    tables: RwLock<Tables>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| c.to_string()).collect()
}

/// Sort key matching the SQL `ORDER BY timestamp, id`.
fn reading_order(a: &Reading, b: &Reading) -> std::cmp::Ordering {
    a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id))
}

fn average_order(a: &StoredAverage, b: &StoredAverage) -> std::cmp::Ordering {
    a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id))
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn insert_reading(&self, reading: NewReading) -> TelemetryResult<i64> {
        let mut tables = self.tables.write();
        tables.next_reading_id += 1;
        let id = tables.next_reading_id;
        tables.readings.push(Reading {
            id,
            kind: reading.kind,
            value: reading.value,
            timestamp: reading.timestamp,
        });
        Ok(id)
    }

    async fn insert_average(&self, record: AverageRecord) -> TelemetryResult<i64> {
        let mut tables = self.tables.write();
        tables.next_average_id += 1;
        let id = tables.next_average_id;
        tables.averages.push(StoredAverage {
            id,
            avg_temperature: record.avg_temperature,
            avg_humidity: record.avg_humidity,
            timestamp: record.timestamp,
        });
        Ok(id)
    }

    async fn average_between(
        &self,
        kind: ReadingKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Option<f64>> {
        let tables = self.tables.read();
        Ok(trailing_average(&tables.readings, kind, from, to))
    }

    async fn readings_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Vec<Reading>> {
        let tables = self.tables.read();
        let mut rows: Vec<Reading> = tables
            .readings
            .iter()
            .filter(|r| r.timestamp >= from && r.timestamp <= to)
            .copied()
            .collect();
        rows.sort_by(reading_order);
        Ok(rows)
    }

    async fn recent_averages(&self, limit: usize) -> TelemetryResult<Vec<StoredAverage>> {
        let tables = self.tables.read();
        let mut rows = tables.averages.clone();
        rows.sort_by(average_order);
        let skip = rows.len().saturating_sub(limit);
        Ok(rows.split_off(skip))
    }

    async fn latest_reading(&self, kind: ReadingKind) -> TelemetryResult<Option<Reading>> {
        let tables = self.tables.read();
        Ok(tables
            .readings
            .iter()
            .filter(|r| r.kind == kind)
            .max_by(|a, b| reading_order(a, b))
            .copied())
    }

    async fn dump_table(&self, table: StoredTable, limit: usize) -> TelemetryResult<TableDump> {
        let tables = self.tables.read();
        let dump = match table {
            StoredTable::RawData => {
                let mut rows = tables.readings.clone();
                rows.sort_by(|a, b| reading_order(b, a));
                TableDump {
                    columns: columns(&["id", "type", "value", "timestamp"]),
                    rows: rows
                        .iter()
                        .take(limit)
                        .map(|r| {
                            vec![
                                Some(r.id.to_string()),
                                Some(r.kind.as_db_str().to_string()),
                                Some(r.value.to_string()),
                                Some(format_timestamp(r.timestamp)),
                            ]
                        })
                        .collect(),
                }
            }
            StoredTable::AvgData => {
                let mut rows = tables.averages.clone();
                rows.sort_by(|a, b| average_order(b, a));
                TableDump {
                    columns: columns(&["id", "avg_temperature", "avg_humidity", "timestamp"]),
                    rows: rows
                        .iter()
                        .take(limit)
                        .map(|a| {
                            vec![
                                Some(a.id.to_string()),
                                a.avg_temperature.map(|v| v.to_string()),
                                a.avg_humidity.map(|v| v.to_string()),
                                Some(format_timestamp(a.timestamp)),
                            ]
                        })
                        .collect(),
                }
            }
        };
        Ok(dump)
    }

    async fn counts(&self) -> TelemetryResult<StoreCounts> {
        let tables = self.tables.read();
        Ok(StoreCounts {
            raw_readings: tables.readings.len() as u64,
            averages: tables.averages.len() as u64,
        })
    }
}

/// A store whose every call fails, for exercising error paths.
#[cfg(test)]
pub(crate) mod failing {
    use super::*;
    use crate::error::TelemetryError;

    pub(crate) const FAILURE: &str = "disk I/O error";

    fn fail<T>() -> TelemetryResult<T> {
        Err(TelemetryError::StorageError(FAILURE.to_string()))
    }

    pub(crate) struct FailingStore;

    #[async_trait]
    impl ReadingStore for FailingStore {
        async fn insert_reading(&self, _: NewReading) -> TelemetryResult<i64> {
            fail()
        }
        async fn insert_average(&self, _: AverageRecord) -> TelemetryResult<i64> {
            fail()
        }
        async fn average_between(
            &self,
            _: ReadingKind,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> TelemetryResult<Option<f64>> {
            fail()
        }
        async fn readings_between(
            &self,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> TelemetryResult<Vec<Reading>> {
            fail()
        }
        async fn recent_averages(&self, _: usize) -> TelemetryResult<Vec<StoredAverage>> {
            fail()
        }
        async fn latest_reading(&self, _: ReadingKind) -> TelemetryResult<Option<Reading>> {
            fail()
        }
        async fn dump_table(&self, _: StoredTable, _: usize) -> TelemetryResult<TableDump> {
            fail()
        }
        async fn counts(&self) -> TelemetryResult<StoreCounts> {
            fail()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn new_reading(kind: ReadingKind, value: f64, seconds_offset: i64) -> NewReading {
        NewReading::new(kind, value, t0() + Duration::seconds(seconds_offset)).unwrap()
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let store = InMemoryReadingStore::new();
        let a = store
            .insert_reading(new_reading(ReadingKind::Temperature, 20.0, 0))
            .await
            .unwrap();
        let b = store
            .insert_reading(new_reading(ReadingKind::Humidity, 50.0, 0))
            .await
            .unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_average_between_and_latest() {
        let store = InMemoryReadingStore::new();
        store.insert_reading(new_reading(ReadingKind::Temperature, 20.0, 10)).await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Temperature, 22.0, 20)).await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Humidity, 50.0, 30)).await.unwrap();

        let avg = store
            .average_between(ReadingKind::Temperature, t0(), t0() + Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(avg, Some(21.0));

        let latest = store.latest_reading(ReadingKind::Temperature).await.unwrap().unwrap();
        assert_eq!(latest.value, 22.0);

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.raw_readings, 3);
        assert_eq!(counts.averages, 0);
    }

    #[tokio::test]
    async fn test_recent_averages_chronological() {
        let store = InMemoryReadingStore::new();
        for i in 0..5 {
            store
                .insert_average(AverageRecord {
                    avg_temperature: Some(i as f64),
                    avg_humidity: None,
                    timestamp: t0() + Duration::minutes(5 * i),
                })
                .await
                .unwrap();
        }

        let recent = store.recent_averages(3).await.unwrap();
        let temps: Vec<_> = recent.iter().map(|a| a.avg_temperature.unwrap()).collect();
        assert_eq!(temps, vec![2.0, 3.0, 4.0]);

        let dump = store.dump_table(StoredTable::AvgData, 2).await.unwrap();
        assert_eq!(dump.rows.len(), 2);
        assert_eq!(dump.rows[0][1].as_deref(), Some("4"));
        assert_eq!(dump.rows[0][2], None);
    }

    #[tokio::test]
    async fn test_readings_since_sorted() {
        let store = InMemoryReadingStore::new();
        store.insert_reading(new_reading(ReadingKind::Temperature, 3.0, 300)).await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Temperature, 1.0, 100)).await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Temperature, 0.0, -100)).await.unwrap();

        let rows = store.readings_since(t0()).await.unwrap();
        let values: Vec<_> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 3.0]);
    }
}
