//! Database row models for raw readings and averages.
//!
//! These structs map directly to SQLite table rows and handle
//! conversion to the domain types in `crate::types`.

use crate::error::{TelemetryError, TelemetryResult};
use crate::types::{parse_timestamp, ReadingKind, Reading, StoredAverage};
use sqlx::FromRow;
use tracing::warn;

/// Database row for a raw reading.
/// Maps to the `raw_data` table, with `type` selected as `kind`.
#[derive(Debug, Clone, FromRow)]
pub struct RawReadingRow {
    pub id: i64,
    pub kind: String,
    pub value: f64,
    pub timestamp: String,
}

impl RawReadingRow {
    /// Convert from database row to domain type.
    pub fn to_domain(&self) -> TelemetryResult<Reading> {
        let kind = ReadingKind::from_db_str(&self.kind).ok_or_else(|| {
            TelemetryError::StorageError(format!(
                "raw_data row {} has unknown type '{}'",
                self.id, self.kind
            ))
        })?;

        Ok(Reading {
            id: self.id,
            kind,
            value: self.value,
            timestamp: parse_timestamp(&self.timestamp)?,
        })
    }

    /// Like [`to_domain`](Self::to_domain), logging and returning `None` for
    /// rows this service cannot read.
    pub fn to_domain_or_skip(&self) -> Option<Reading> {
        if ReadingKind::from_db_str(&self.kind).is_none() {
            warn!(id = self.id, kind = %self.kind, "Skipping raw_data row of unknown type");
            return None;
        }
        match self.to_domain() {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!(id = self.id, timestamp = %self.timestamp, error = %e, "Skipping raw_data row");
                None
            }
        }
    }
}

/// Database row for an average.
/// Maps to the `avg_data` table.
#[derive(Debug, Clone, FromRow)]
pub struct AverageRow {
    pub id: i64,
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub timestamp: String,
}

impl AverageRow {
    /// Convert from database row to domain type.
    pub fn to_domain(&self) -> TelemetryResult<StoredAverage> {
        Ok(StoredAverage {
            id: self.id,
            avg_temperature: self.avg_temperature,
            avg_humidity: self.avg_humidity,
            timestamp: parse_timestamp(&self.timestamp)?,
        })
    }
}

/// Convert a batch of raw rows.
///
/// Older databases accepted any type and any timestamp text. Rows of an
/// unknown type or with an unparseable timestamp are skipped.
pub fn readings_from_rows(rows: Vec<RawReadingRow>) -> Vec<Reading> {
    rows.iter().filter_map(RawReadingRow::to_domain_or_skip).collect()
}

/// Convert a batch of average rows, skipping rows with an unparseable timestamp.
pub fn averages_from_rows(rows: Vec<AverageRow>) -> Vec<StoredAverage> {
    rows.iter()
        .filter_map(|row| match row.to_domain() {
            Ok(average) => Some(average),
            Err(e) => {
                warn!(id = row.id, timestamp = %row.timestamp, error = %e, "Skipping avg_data row");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_row_to_domain() {
        let row = RawReadingRow {
            id: 7,
            kind: "humidity".to_string(),
            value: 48.5,
            timestamp: "2024-05-01T12:00:00.000Z".to_string(),
        };
        let reading = row.to_domain().unwrap();
        assert_eq!(reading.kind, ReadingKind::Humidity);
        assert_eq!(reading.id, 7);
    }

    #[test]
    fn test_raw_row_unknown_kind_is_storage_error() {
        let row = RawReadingRow {
            id: 1,
            kind: "pressure".to_string(),
            value: 1013.0,
            timestamp: "2024-05-01T12:00:00.000Z".to_string(),
        };
        assert!(matches!(row.to_domain(), Err(TelemetryError::StorageError(_))));
    }

    #[test]
    fn test_batch_skips_unknown_kinds() {
        let rows = vec![
            RawReadingRow {
                id: 1,
                kind: "pressure".to_string(),
                value: 1013.0,
                timestamp: "2024-05-01T12:00:00.000Z".to_string(),
            },
            RawReadingRow {
                id: 2,
                kind: "temperature".to_string(),
                value: 20.0,
                timestamp: "2024-05-01T12:00:01.000Z".to_string(),
            },
        ];
        let readings = readings_from_rows(rows);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].id, 2);
    }

    #[test]
    fn test_batch_skips_unparseable_timestamps() {
        let rows = vec![
            RawReadingRow {
                id: 1,
                kind: "temperature".to_string(),
                value: 19.0,
                timestamp: "5/1/2024, 12:00:05 PM".to_string(),
            },
            RawReadingRow {
                id: 2,
                kind: "humidity".to_string(),
                value: 55.0,
                timestamp: "2024-05-01T12:00:06.000Z".to_string(),
            },
        ];
        let readings = readings_from_rows(rows);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].kind, ReadingKind::Humidity);

        let averages = averages_from_rows(vec![
            AverageRow {
                id: 1,
                avg_temperature: Some(20.0),
                avg_humidity: None,
                timestamp: "yesterday".to_string(),
            },
            AverageRow {
                id: 2,
                avg_temperature: Some(21.0),
                avg_humidity: Some(50.0),
                timestamp: "2024-05-01T12:05:00.000Z".to_string(),
            },
        ]);
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[0].id, 2);
    }
}
