//! Decoding of scalar sensor payloads.
//!
//! Accepted forms, after trimming whitespace:
//!
//! - a plain number, `23.4` (also valid JSON)
//! - a JSON object, `{"value": 23.4, "timestamp": "2024-05-01T12:00:00Z"}`
//!
//! The reading kind comes from the topic, not the payload. Without a
//! timestamp the reading is stamped with the receipt time.

use crate::error::{TelemetryError, TelemetryResult};
use crate::types::{parse_timestamp, NewReading, ReadingKind};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ObjectPayload {
    value: Option<f64>,
    timestamp: Option<String>,
}

/// Decode a payload received on `topic` for `kind`.
pub fn parse_payload(
    topic: &str,
    kind: ReadingKind,
    payload: &[u8],
    received_at: DateTime<Utc>,
) -> TelemetryResult<NewReading> {
    let invalid = |reason: String| TelemetryError::InvalidPayload {
        topic: topic.to_string(),
        reason,
    };

    let text = std::str::from_utf8(payload)
        .map_err(|e| invalid(format!("not UTF-8: {}", e)))?
        .trim();

    if text.is_empty() {
        return Err(invalid("empty payload".to_string()));
    }

    if text.starts_with('{') {
        let object: ObjectPayload =
            serde_json::from_str(text).map_err(|e| invalid(format!("bad JSON: {}", e)))?;
        let value = object.value.ok_or(TelemetryError::MissingField("value"))?;
        let timestamp = match object.timestamp.as_deref() {
            Some(ts) => parse_timestamp(ts)?,
            None => received_at,
        };
        return NewReading::new(kind, value, timestamp);
    }

    let value: f64 = text
        .parse()
        .map_err(|_| invalid(format!("'{}' is not a number", text)))?;
    NewReading::new(kind, value, received_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_plain_number() {
        let reading = tokio_test::assert_ok!(parse_payload("t", ReadingKind::Temperature, b" 23.4\n", now()));
        assert_eq!(reading.kind, ReadingKind::Temperature);
        assert_eq!(reading.value, 23.4);
        assert_eq!(reading.timestamp, now());
    }

    #[test]
    fn test_json_object_with_timestamp() {
        let payload = br#"{"value": 61, "timestamp": "2024-05-01T11:59:30Z"}"#;
        let reading = parse_payload("h", ReadingKind::Humidity, payload, now()).unwrap();
        assert_eq!(reading.value, 61.0);
        assert_eq!(reading.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 30).unwrap());
    }

    #[test]
    fn test_json_object_without_timestamp() {
        let reading = parse_payload("h", ReadingKind::Humidity, br#"{"value": -0.5}"#, now()).unwrap();
        assert_eq!(reading.value, -0.5);
        assert_eq!(reading.timestamp, now());
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            parse_payload("t", ReadingKind::Temperature, b"warm", now()),
            Err(TelemetryError::InvalidPayload { .. })
        ));
        assert!(matches!(
            parse_payload("t", ReadingKind::Temperature, b"", now()),
            Err(TelemetryError::InvalidPayload { .. })
        ));
        assert!(matches!(
            parse_payload("t", ReadingKind::Temperature, br#"{"temp": 1}"#, now()),
            Err(TelemetryError::MissingField("value"))
        ));
        assert!(matches!(
            parse_payload("t", ReadingKind::Temperature, b"NaN", now()),
            Err(TelemetryError::InvalidValue(_))
        ));
        assert!(matches!(
            parse_payload("t", ReadingKind::Temperature, &[0xff, 0xfe], now()),
            Err(TelemetryError::InvalidPayload { .. })
        ));
    }
}
