//! Error types for the telemetry crate.

use thiserror::Error;

/// Result type alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors that can occur while ingesting, storing or aggregating readings.
#[derive(Error, Debug, Clone)]
pub enum TelemetryError {
    /// A required field was absent from an incoming reading.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Reading kind is not one of the supported kinds.
    #[error("Unknown reading type: {0}. Expected temperature or humidity")]
    UnknownKind(String),

    /// Reading value is NaN or infinite.
    #[error("Invalid reading value: {0}")]
    InvalidValue(f64),

    /// Timestamp could not be parsed as RFC 3339.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Aggregation window could not be parsed or is zero.
    #[error("Invalid aggregation window: {0}")]
    InvalidWindow(String),

    /// Gap fill policy could not be parsed.
    #[error("Invalid gap fill policy: {0}. Expected skip, null or carry_forward")]
    InvalidGapFill(String),

    /// Payload from the message broker could not be decoded.
    #[error("Invalid payload on topic {topic}: {reason}")]
    InvalidPayload { topic: String, reason: String },

    /// Storage error.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TelemetryError {
    /// True for errors caused by bad client input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TelemetryError::MissingField(_)
                | TelemetryError::UnknownKind(_)
                | TelemetryError::InvalidValue(_)
                | TelemetryError::InvalidTimestamp(_)
                | TelemetryError::InvalidWindow(_)
                | TelemetryError::InvalidGapFill(_)
                | TelemetryError::InvalidPayload { .. }
        )
    }

    /// Short label used for the rejected-readings metric.
    pub fn reason(&self) -> &'static str {
        match self {
            TelemetryError::MissingField(_) => "missing_field",
            TelemetryError::UnknownKind(_) => "unknown_kind",
            TelemetryError::InvalidValue(_) => "invalid_value",
            TelemetryError::InvalidTimestamp(_) => "invalid_timestamp",
            TelemetryError::InvalidWindow(_) => "invalid_window",
            TelemetryError::InvalidGapFill(_) => "invalid_gap_fill",
            TelemetryError::InvalidPayload { .. } => "invalid_payload",
            TelemetryError::StorageError(_) => "storage",
            TelemetryError::ConfigError(_) => "config",
        }
    }
}

impl From<sqlx::Error> for TelemetryError {
    fn from(err: sqlx::Error) -> Self {
        TelemetryError::StorageError(err.to_string())
    }
}
