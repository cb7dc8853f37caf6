//! Core domain types for weather telemetry.
//!
//! - `ReadingKind`: which scalar a reading carries
//! - `NewReading` / `Reading`: a raw sample before and after persistence
//! - `AverageRecord` / `StoredAverage`: a trailing-window average row
//! - `LatestValues`: the most recent value of each kind, kept in memory

use crate::error::{TelemetryError, TelemetryResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of scalar carried by a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingKind {
    /// Air temperature in degrees Celsius.
    Temperature,
    /// Relative humidity in percent.
    Humidity,
}

impl ReadingKind {
    /// All supported kinds, in display order.
    pub const ALL: [ReadingKind; 2] = [ReadingKind::Temperature, ReadingKind::Humidity];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ReadingKind::Temperature => "temperature",
            ReadingKind::Humidity => "humidity",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "temperature" => Some(ReadingKind::Temperature),
            "humidity" => Some(ReadingKind::Humidity),
            _ => None,
        }
    }

    /// Parse user input, rejecting unknown kinds.
    pub fn parse(s: &str) -> TelemetryResult<Self> {
        Self::from_db_str(s.trim()).ok_or_else(|| TelemetryError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Format a timestamp the way it is persisted: fixed-width RFC 3339,
/// millisecond precision, `Z` suffix. Lexicographic order of the result
/// matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp with any offset into UTC.
pub fn parse_timestamp(s: &str) -> TelemetryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TelemetryError::InvalidTimestamp(format!("{}: {}", s, e)))
}

/// A reading that has not been stored yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewReading {
    pub kind: ReadingKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl NewReading {
    /// Create a reading, rejecting non-finite values.
    pub fn new(kind: ReadingKind, value: f64, timestamp: DateTime<Utc>) -> TelemetryResult<Self> {
        if !value.is_finite() {
            return Err(TelemetryError::InvalidValue(value));
        }
        Ok(Self {
            kind,
            value,
            timestamp,
        })
    }

    /// Create a reading stamped with the current time.
    pub fn now(kind: ReadingKind, value: f64) -> TelemetryResult<Self> {
        Self::new(kind, value, Utc::now())
    }
}

/// A persisted raw reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ReadingKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// An average row that has not been stored yet.
///
/// At least one of the two sides is `Some`; see
/// [`resolve_window_average`](crate::aggregate::resolve_window_average).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageRecord {
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// A persisted average row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredAverage {
    pub id: i64,
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Most recent value seen for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatestValue {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Most recent value of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestValues {
    pub temperature: Option<LatestValue>,
    pub humidity: Option<LatestValue>,
}

impl LatestValues {
    /// Get the latest value for a kind.
    pub fn get(&self, kind: ReadingKind) -> Option<LatestValue> {
        match kind {
            ReadingKind::Temperature => self.temperature,
            ReadingKind::Humidity => self.humidity,
        }
    }

    /// Record a reading as the latest of its kind.
    pub fn record(&mut self, reading: &NewReading) {
        let latest = Some(LatestValue {
            value: reading.value,
            timestamp: reading.timestamp,
        });
        match reading.kind {
            ReadingKind::Temperature => self.temperature = latest,
            ReadingKind::Humidity => self.humidity = latest,
        }
    }

    /// True when no value of either kind has been seen.
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none()
    }
}

/// Row counts of the two tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub raw_readings: u64,
    pub averages: u64,
}

/// The two stored tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoredTable {
    RawData,
    AvgData,
}

impl StoredTable {
    /// SQL table name.
    pub fn name(self) -> &'static str {
        match self {
            StoredTable::RawData => "raw_data",
            StoredTable::AvgData => "avg_data",
        }
    }
}

impl fmt::Display for StoredTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stored rows as text, exactly as kept in the table.
///
/// A `None` cell is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDump {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}
