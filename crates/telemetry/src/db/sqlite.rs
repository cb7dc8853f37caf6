//! SQLite implementation of the `ReadingStore` trait.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (see
//! [`format_timestamp`]), so range filters and `ORDER BY timestamp`
//! compare strings and still follow chronological order.

use crate::db::models::{averages_from_rows, readings_from_rows, AverageRow, RawReadingRow};
use crate::error::{TelemetryError, TelemetryResult};
use crate::store::ReadingStore;
use crate::types::{
    format_timestamp, AverageRecord, NewReading, Reading, ReadingKind, StoreCounts,
    StoredAverage, StoredTable, TableDump,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, instrument};

const READING_COLUMNS: &str = "id, type AS kind, value, timestamp";
const AVERAGE_COLUMNS: &str = "id, avg_temperature, avg_humidity, timestamp";

/// Rows fetched per round while looking for the newest readable reading.
const LATEST_BATCH: i64 = 32;

/// Quote an SQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite-backed reading store.
#[derive(Debug, Clone)]
pub struct SqliteReadingStore {
    pool: SqlitePool,
}

impl SqliteReadingStore {
    /// Open (creating if missing) the database at `database_url` and run migrations.
    ///
    /// Accepts `sqlite://path/to/file.db`, `sqlite:file.db` or `sqlite::memory:`.
    pub async fn new(database_url: &str, max_connections: u32) -> TelemetryResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                TelemetryError::StorageError(format!(
                    "Invalid database URL '{}': {}",
                    database_url, e
                ))
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| {
                TelemetryError::StorageError(format!("Failed to open database: {}", e))
            })?;

        info!(database_url, "Connected to SQLite database");

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Private in-memory database on a single long-lived connection.
    pub async fn in_memory() -> TelemetryResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create both tables and their indexes if they do not exist.
    pub async fn run_migrations(&self) -> TelemetryResult<()> {
        let migration_sql = include_str!("../../../../migrations/001_create_weather_tables.sql");
        sqlx::raw_sql(migration_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| TelemetryError::StorageError(format!("Migration failed: {}", e)))?;
        info!("Database tables created or already exist");
        Ok(())
    }

    /// Close the pool, waiting for connections to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert a raw row with arbitrary text, as older databases may hold.
    #[cfg(test)]
    pub(crate) async fn insert_raw_text(&self, kind: &str, value: f64, timestamp: &str) {
        sqlx::query("INSERT INTO raw_data (type, value, timestamp) VALUES (?, ?, ?)")
            .bind(kind)
            .bind(value)
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

#[async_trait]
impl ReadingStore for SqliteReadingStore {
    #[instrument(skip(self))]
    async fn insert_reading(&self, reading: NewReading) -> TelemetryResult<i64> {
        let result = sqlx::query("INSERT INTO raw_data (type, value, timestamp) VALUES (?, ?, ?)")
            .bind(reading.kind.as_db_str())
            .bind(reading.value)
            .bind(format_timestamp(reading.timestamp))
            .execute(&self.pool)
            .await
            .map_err(|e| TelemetryError::StorageError(format!("Failed to store reading: {}", e)))?;

        let id = result.last_insert_rowid();
        debug!(id, kind = %reading.kind, value = reading.value, "Stored raw reading");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn insert_average(&self, record: AverageRecord) -> TelemetryResult<i64> {
        let result = sqlx::query(
            "INSERT INTO avg_data (avg_temperature, avg_humidity, timestamp) VALUES (?, ?, ?)",
        )
        .bind(record.avg_temperature)
        .bind(record.avg_humidity)
        .bind(format_timestamp(record.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| TelemetryError::StorageError(format!("Failed to store average: {}", e)))?;

        Ok(result.last_insert_rowid())
    }

    #[instrument(skip(self))]
    async fn average_between(
        &self,
        kind: ReadingKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Option<f64>> {
        let avg = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(value) FROM raw_data WHERE type = ? AND timestamp > ? AND timestamp <= ?",
        )
        .bind(kind.as_db_str())
        .bind(format_timestamp(from))
        .bind(format_timestamp(to))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            TelemetryError::StorageError(format!("Failed to calculate average {}: {}", kind, e))
        })?;

        Ok(avg)
    }

    #[instrument(skip(self))]
    async fn readings_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> TelemetryResult<Vec<Reading>> {
        let sql = format!(
            "SELECT {} FROM raw_data WHERE timestamp >= ? AND timestamp <= ? \
             ORDER BY timestamp ASC, id ASC",
            READING_COLUMNS
        );
        let rows = sqlx::query_as::<_, RawReadingRow>(&sql)
            .bind(format_timestamp(from))
            .bind(format_timestamp(to))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TelemetryError::StorageError(format!("Failed to fetch readings: {}", e)))?;

        Ok(readings_from_rows(rows))
    }

    #[instrument(skip(self))]
    async fn readings_since(&self, cutoff: DateTime<Utc>) -> TelemetryResult<Vec<Reading>> {
        let sql = format!(
            "SELECT {} FROM raw_data WHERE timestamp >= ? ORDER BY timestamp ASC, id ASC",
            READING_COLUMNS
        );
        let rows = sqlx::query_as::<_, RawReadingRow>(&sql)
            .bind(format_timestamp(cutoff))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TelemetryError::StorageError(format!("Failed to fetch readings: {}", e)))?;

        Ok(readings_from_rows(rows))
    }

    #[instrument(skip(self))]
    async fn recent_averages(&self, limit: usize) -> TelemetryResult<Vec<StoredAverage>> {
        let sql = format!(
            "SELECT {cols} FROM (\
                SELECT {cols} FROM avg_data ORDER BY timestamp DESC, id DESC LIMIT ?\
             ) ORDER BY timestamp ASC, id ASC",
            cols = AVERAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, AverageRow>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                TelemetryError::StorageError(format!("Failed to fetch historical data: {}", e))
            })?;

        Ok(averages_from_rows(rows))
    }

    #[instrument(skip(self))]
    async fn latest_reading(&self, kind: ReadingKind) -> TelemetryResult<Option<Reading>> {
        let sql = format!(
            "SELECT {} FROM raw_data WHERE type = ? ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            READING_COLUMNS
        );
        let mut offset = 0i64;
        loop {
            let rows = sqlx::query_as::<_, RawReadingRow>(&sql)
                .bind(kind.as_db_str())
                .bind(LATEST_BATCH)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    TelemetryError::StorageError(format!("Failed to fetch latest {}: {}", kind, e))
                })?;

            if let Some(reading) = rows.iter().find_map(RawReadingRow::to_domain_or_skip) {
                return Ok(Some(reading));
            }
            if (rows.len() as i64) < LATEST_BATCH {
                return Ok(None);
            }
            offset += LATEST_BATCH;
        }
    }

    #[instrument(skip(self))]
    async fn dump_table(&self, table: StoredTable, limit: usize) -> TelemetryResult<TableDump> {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info(?) ORDER BY cid")
                .bind(table.name())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    TelemetryError::StorageError(format!("Failed to read {} schema: {}", table, e))
                })?;
        if columns.is_empty() {
            return Err(TelemetryError::StorageError(format!("no such table: {}", table)));
        }

        let select = columns
            .iter()
            .map(|c| format!("CAST({} AS TEXT)", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} ORDER BY timestamp DESC, id DESC LIMIT ?",
            select,
            table.name()
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TelemetryError::StorageError(format!("Failed to fetch {}: {}", table, e)))?;

        let rows = rows
            .iter()
            .map(|row| {
                (0..columns.len())
                    .map(|i| row.try_get::<Option<String>, _>(i))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TableDump { columns, rows })
    }

    #[instrument(skip(self))]
    async fn counts(&self) -> TelemetryResult<StoreCounts> {
        let raw_readings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raw_data")
            .fetch_one(&self.pool)
            .await?;
        let averages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM avg_data")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreCounts {
            raw_readings: raw_readings as u64,
            averages: averages as u64,
        })
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
    async fn test_migrations_are_idempotent() {
        let store = SqliteReadingStore::in_memory().await.unwrap();
        store.run_migrations().await.unwrap();
        assert_eq!(store.counts().await.unwrap(), StoreCounts::default());
    }

    #[tokio::test]
    async fn test_insert_and_average_window() {
        let store = SqliteReadingStore::in_memory().await.unwrap();

        let first = store
            .insert_reading(new_reading(ReadingKind::Temperature, 10.0, 0))
            .await
            .unwrap();
        let second = store
            .insert_reading(new_reading(ReadingKind::Temperature, 20.0, 120))
            .await
            .unwrap();
        store
            .insert_reading(new_reading(ReadingKind::Temperature, 30.0, 300))
            .await
            .unwrap();
        assert!(second > first);

        // Lower bound exclusive, upper bound inclusive
        let avg = store
            .average_between(ReadingKind::Temperature, t0(), t0() + Duration::seconds(300))
            .await
            .unwrap();
        assert_eq!(avg, Some(25.0));

        let empty = store
            .average_between(ReadingKind::Humidity, t0(), t0() + Duration::seconds(300))
            .await
            .unwrap();
        assert_eq!(empty, None);
    }

    #[tokio::test]
    async fn test_readings_since_and_between() {
        let store = SqliteReadingStore::in_memory().await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Humidity, 40.0, 600)).await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Temperature, 15.0, 60)).await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Temperature, 14.0, -60)).await.unwrap();

        let since = store.readings_since(t0()).await.unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].kind, ReadingKind::Temperature);
        assert_eq!(since[1].kind, ReadingKind::Humidity);

        let between = store
            .readings_between(t0() - Duration::seconds(60), t0() + Duration::seconds(60))
            .await
            .unwrap();
        let values: Vec<_> = between.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![14.0, 15.0]);
    }

    #[tokio::test]
    async fn test_averages_history_order() {
        let store = SqliteReadingStore::in_memory().await.unwrap();
        for i in 0..15 {
            store
                .insert_average(AverageRecord {
                    avg_temperature: Some(i as f64),
                    avg_humidity: if i % 2 == 0 { Some(50.0) } else { None },
                    timestamp: t0() + Duration::minutes(5 * i),
                })
                .await
                .unwrap();
        }

        let history = store.recent_averages(12).await.unwrap();
        assert_eq!(history.len(), 12);
        assert_eq!(history.first().unwrap().avg_temperature, Some(3.0));
        assert_eq!(history.last().unwrap().avg_temperature, Some(14.0));
        assert_eq!(history.last().unwrap().avg_humidity, Some(50.0));
        assert_eq!(history[0].avg_humidity, None);

        let dump = store.dump_table(StoredTable::AvgData, 100).await.unwrap();
        assert_eq!(dump.rows.len(), 15);
        assert_eq!(dump.rows[0][1].as_deref(), Some("14.0"));
        assert_eq!(dump.rows[0][2].as_deref(), Some("50.0"));
        assert_eq!(dump.rows[1][2], None);
    }

    #[tokio::test]
    async fn test_latest_reading_by_kind() {
        let store = SqliteReadingStore::in_memory().await.unwrap();
        assert!(store.latest_reading(ReadingKind::Humidity).await.unwrap().is_none());

        store.insert_reading(new_reading(ReadingKind::Humidity, 40.0, 10)).await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Humidity, 45.0, 20)).await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Temperature, 9.0, 30)).await.unwrap();

        let latest = store.latest_reading(ReadingKind::Humidity).await.unwrap().unwrap();
        assert_eq!(latest.value, 45.0);
        assert_eq!(latest.timestamp, t0() + Duration::seconds(20));

        let raw = store.dump_table(StoredTable::RawData, 2).await.unwrap();
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[0][1].as_deref(), Some("temperature"));
    }

    #[tokio::test]
    async fn test_legacy_rows_are_skipped_by_queries() {
        let store = SqliteReadingStore::in_memory().await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Temperature, 18.0, 0)).await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Humidity, 60.0, 5)).await.unwrap();
        // Text timestamps sort after ISO ones, so these are the newest rows.
        store.insert_raw_text("temperature", 99.0, "5/1/2024, 12:00:05 PM").await;
        store.insert_raw_text("pressure", 1013.0, "2024-05-01T12:00:10.000Z").await;

        let since = store.readings_since(t0()).await.unwrap();
        let values: Vec<_> = since.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![18.0, 60.0]);

        let latest = store.latest_reading(ReadingKind::Temperature).await.unwrap().unwrap();
        assert_eq!(latest.value, 18.0);
        assert_eq!(latest.timestamp, t0());
    }

    #[tokio::test]
    async fn test_latest_reading_walks_past_many_bad_rows() {
        let store = SqliteReadingStore::in_memory().await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Humidity, 42.0, 0)).await.unwrap();
        for i in 0..(LATEST_BATCH + 3) {
            store.insert_raw_text("humidity", i as f64, &format!("9/{}/2024", i)).await;
        }

        let latest = store.latest_reading(ReadingKind::Humidity).await.unwrap().unwrap();
        assert_eq!(latest.value, 42.0);

        for i in 0..3 {
            store.insert_raw_text("temperature", i as f64, "not a time").await;
        }
        assert!(store.latest_reading(ReadingKind::Temperature).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dump_table_shows_stored_text() {
        let store = SqliteReadingStore::in_memory().await.unwrap();
        store.insert_reading(new_reading(ReadingKind::Temperature, 18.5, 0)).await.unwrap();
        store.insert_raw_text("pressure", 1013.0, "5/1/2024, 12:00:05 PM").await;

        let dump = store.dump_table(StoredTable::RawData, 100).await.unwrap();
        assert_eq!(dump.columns, vec!["id", "type", "value", "timestamp"]);
        assert_eq!(dump.rows.len(), 2);
        assert_eq!(
            dump.rows[0],
            vec![
                Some("2".to_string()),
                Some("pressure".to_string()),
                Some("1013.0".to_string()),
                Some("5/1/2024, 12:00:05 PM".to_string()),
            ]
        );
        assert_eq!(dump.rows[1][3].as_deref(), Some("2024-05-01T12:00:00.000Z"));
    }

    #[tokio::test]
    async fn test_dump_table_follows_schema() {
        let store = SqliteReadingStore::in_memory().await.unwrap();
        sqlx::query("ALTER TABLE avg_data ADD COLUMN station TEXT")
            .execute(&store.pool)
            .await
            .unwrap();
        store
            .insert_average(AverageRecord {
                avg_temperature: None,
                avg_humidity: Some(47.0),
                timestamp: t0(),
            })
            .await
            .unwrap();

        let dump = store.dump_table(StoredTable::AvgData, 10).await.unwrap();
        assert_eq!(
            dump.columns,
            vec!["id", "avg_temperature", "avg_humidity", "timestamp", "station"]
        );
        assert_eq!(dump.rows[0][1], None);
        assert_eq!(dump.rows[0][4], None);
    }
}
