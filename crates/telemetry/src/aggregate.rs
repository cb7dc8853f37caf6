//! Time-bucketed aggregation of raw readings.
//!
//! Readings are grouped into fixed windows aligned to the Unix epoch and
//! averaged per kind. Two consumers use this module:
//!
//! - the averaging worker, which needs one trailing-window mean per kind
//!   ([`trailing_average`], [`resolve_window_average`])
//! - the series endpoint, which needs a dense or sparse run of buckets over
//!   a lookback range ([`bucketize`], [`rolling_mean`])
//!
//! Missing data is expected: sensors drop out, and temperature and humidity
//! arrive independently. Every mean is therefore an `Option<f64>`, and a
//! genuine mean of `0.0` is data, not absence.

use crate::error::{TelemetryError, TelemetryResult};
use crate::types::{AverageRecord, LatestValues, Reading, ReadingKind};
use chrono::{DateTime, Duration, TimeZone, Utc};
use config::{window_seconds, MAX_WINDOW_SECONDS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Upper bound on buckets enumerated for a single series.
pub const MAX_BUCKETS: i64 = 10_000;

/// Fixed aggregation window, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AggregationWindow {
    seconds: i64,
}

impl AggregationWindow {
    pub const TEN_SECONDS: AggregationWindow = AggregationWindow { seconds: 10 };
    pub const ONE_MINUTE: AggregationWindow = AggregationWindow { seconds: 60 };
    pub const FIVE_MINUTES: AggregationWindow = AggregationWindow { seconds: 300 };

    /// Create a window from a number of seconds.
    ///
    /// Lengths outside `1..=MAX_WINDOW_SECONDS` are rejected.
    pub fn from_seconds(seconds: i64) -> TelemetryResult<Self> {
        if seconds <= 0 || seconds as u64 > MAX_WINDOW_SECONDS {
            return Err(TelemetryError::InvalidWindow(format!(
                "{}s (window must be between 1s and {}s)",
                seconds, MAX_WINDOW_SECONDS
            )));
        }
        Ok(Self { seconds })
    }

    pub fn as_seconds(&self) -> i64 {
        self.seconds
    }

    pub fn as_millis(&self) -> i64 {
        self.seconds.saturating_mul(1000)
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }

    /// Parse `"10s"`, `"1m"`, `"5m"`, `"1h"`, `"1d"` or a bare number of seconds.
    ///
    /// Uses the same grammar as configuration validation.
    pub fn parse(s: &str) -> TelemetryResult<Self> {
        let seconds = window_seconds(s)
            .and_then(|secs| i64::try_from(secs).ok())
            .ok_or_else(|| TelemetryError::InvalidWindow(s.trim().to_string()))?;
        Self::from_seconds(seconds)
    }

    /// Shortest unit representation, e.g. `300` seconds -> `"5m"`.
    pub fn as_str(&self) -> String {
        let s = self.seconds;
        if s % 86_400 == 0 {
            format!("{}d", s / 86_400)
        } else if s % 3600 == 0 {
            format!("{}h", s / 3600)
        } else if s % 60 == 0 {
            format!("{}m", s / 60)
        } else {
            format!("{}s", s)
        }
    }
}

impl fmt::Display for AggregationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl FromStr for AggregationWindow {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AggregationWindow {
    type Error = TelemetryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AggregationWindow> for String {
    fn from(window: AggregationWindow) -> Self {
        window.as_str()
    }
}

/// Start of the window containing `ts`.
///
/// Windows are aligned to the Unix epoch, so a 5 minute window always opens
/// at :00, :05, :10 and so on. Timestamps before the epoch floor toward
/// negative infinity.
pub fn bucket_start(ts: DateTime<Utc>, window: AggregationWindow) -> DateTime<Utc> {
    let window_millis = window.as_millis();
    let open_millis = ts.timestamp_millis().div_euclid(window_millis) * window_millis;
    Utc.timestamp_millis_opt(open_millis).single().unwrap_or(ts)
}

/// Running sum and count for one kind within one bucket.
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    count: u32,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Mean of readings of `kind` with `from < timestamp <= to`.
pub fn trailing_average(
    readings: &[Reading],
    kind: ReadingKind,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Option<f64> {
    let mut acc = Accumulator::default();
    readings
        .iter()
        .filter(|r| r.kind == kind && r.timestamp > from && r.timestamp <= to)
        .for_each(|r| acc.add(r.value));
    acc.mean()
}

/// Combine trailing-window means with the latest known values.
///
/// Each side falls back to the latest value of its kind when the window held
/// no readings. Returns `None` when neither side has anything to report, in
/// which case no average row should be written.
pub fn resolve_window_average(
    avg_temperature: Option<f64>,
    avg_humidity: Option<f64>,
    latest: &LatestValues,
    timestamp: DateTime<Utc>,
) -> Option<AverageRecord> {
    let avg_temperature = avg_temperature.or(latest.temperature.map(|v| v.value));
    let avg_humidity = avg_humidity.or(latest.humidity.map(|v| v.value));

    if avg_temperature.is_none() && avg_humidity.is_none() {
        return None;
    }

    Some(AverageRecord {
        avg_temperature,
        avg_humidity,
        timestamp,
    })
}

/// How buckets with missing data are reported by [`bucketize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapFill {
    /// Omit buckets that hold no readings of either kind.
    Skip,
    /// Emit every bucket; missing sides are `null`.
    Null,
    /// Emit every bucket; a missing side repeats the previous bucket's value.
    #[default]
    CarryForward,
}

impl GapFill {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapFill::Skip => "skip",
            GapFill::Null => "null",
            GapFill::CarryForward => "carry_forward",
        }
    }

    pub fn parse(s: &str) -> TelemetryResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(GapFill::Skip),
            "null" | "none" => Ok(GapFill::Null),
            "carry_forward" | "carry-forward" | "ffill" => Ok(GapFill::CarryForward),
            _ => Err(TelemetryError::InvalidGapFill(s.to_string())),
        }
    }
}

impl FromStr for GapFill {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Averages for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketAverage {
    pub bucket_start: DateTime<Utc>,
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub temperature_samples: u32,
    pub humidity_samples: u32,
    /// True when at least one side was carried forward rather than measured.
    pub filled: bool,
}

impl BucketAverage {
    fn from_accumulators(
        bucket_start: DateTime<Utc>,
        temperature: Accumulator,
        humidity: Accumulator,
    ) -> Self {
        Self {
            bucket_start,
            avg_temperature: temperature.mean(),
            avg_humidity: humidity.mean(),
            temperature_samples: temperature.count,
            humidity_samples: humidity.count,
            filled: false,
        }
    }
}

/// Group readings into consecutive windows covering `[bucket_start(from), to]`.
///
/// Readings outside the range are ignored; the input need not be sorted.
/// The result is in ascending bucket order. For [`GapFill::Null`] and
/// [`GapFill::CarryForward`] the range may span at most [`MAX_BUCKETS`] windows.
pub fn bucketize(
    readings: &[Reading],
    window: AggregationWindow,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    gap_fill: GapFill,
) -> TelemetryResult<Vec<BucketAverage>> {
    if to < from {
        return Ok(Vec::new());
    }

    let first = bucket_start(from, window);
    let last = bucket_start(to, window);
    let window_millis = window.as_millis();

    let mut buckets: BTreeMap<i64, (Accumulator, Accumulator)> = BTreeMap::new();
    for reading in readings {
        if reading.timestamp < first || reading.timestamp > to {
            continue;
        }
        let key = bucket_start(reading.timestamp, window).timestamp_millis();
        let (temperature, humidity) = buckets.entry(key).or_default();
        match reading.kind {
            ReadingKind::Temperature => temperature.add(reading.value),
            ReadingKind::Humidity => humidity.add(reading.value),
        }
    }

    let to_time = |millis: i64| Utc.timestamp_millis_opt(millis).single();

    if gap_fill == GapFill::Skip {
        return Ok(buckets
            .into_iter()
            .filter_map(|(key, (t, h))| {
                to_time(key).map(|start| BucketAverage::from_accumulators(start, t, h))
            })
            .collect());
    }

    let span = (last.timestamp_millis() - first.timestamp_millis()) / window_millis + 1;
    if span > MAX_BUCKETS {
        return Err(TelemetryError::InvalidWindow(format!(
            "range spans {} windows of {}, at most {} allowed",
            span, window, MAX_BUCKETS
        )));
    }

    let mut result = Vec::with_capacity(span as usize);
    let mut carried_temperature: Option<f64> = None;
    let mut carried_humidity: Option<f64> = None;

    for index in 0..span {
        let key = first.timestamp_millis() + index * window_millis;
        let Some(start) = to_time(key) else {
            continue;
        };
        let (t, h) = buckets.get(&key).copied().unwrap_or_default();
        let mut bucket = BucketAverage::from_accumulators(start, t, h);

        if gap_fill == GapFill::CarryForward {
            if bucket.avg_temperature.is_none() && carried_temperature.is_some() {
                bucket.avg_temperature = carried_temperature;
                bucket.filled = true;
            }
            if bucket.avg_humidity.is_none() && carried_humidity.is_some() {
                bucket.avg_humidity = carried_humidity;
                bucket.filled = true;
            }
            carried_temperature = bucket.avg_temperature;
            carried_humidity = bucket.avg_humidity;
        }

        result.push(bucket);
    }

    Ok(result)
}

/// Trailing moving average over the last `span` buckets, per kind.
///
/// `None` entries are skipped rather than treated as zero; a position with
/// no values in its span stays `None`. Sample counts and `filled` are kept
/// from the input bucket.
pub fn rolling_mean(buckets: &[BucketAverage], span: usize) -> Vec<BucketAverage> {
    if span <= 1 {
        return buckets.to_vec();
    }

    buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| {
            let lo = (i + 1).saturating_sub(span);
            let window = &buckets[lo..=i];

            let mut temperature = Accumulator::default();
            let mut humidity = Accumulator::default();
            for b in window {
                if let Some(v) = b.avg_temperature {
                    temperature.add(v);
                }
                if let Some(v) = b.avg_humidity {
                    humidity.add(v);
                }
            }

            BucketAverage {
                avg_temperature: temperature.mean(),
                avg_humidity: humidity.mean(),
                ..*bucket
            }
        })
        .collect()
}
