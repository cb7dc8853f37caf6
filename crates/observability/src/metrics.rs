//! Prometheus metrics.
//!
//! [`init_metrics`] installs the global recorder with an HTTP listener;
//! [`TelemetryMetrics`] holds the handles the ingestion path updates. Without
//! an installed recorder every update is a no-op.

use metrics::{counter, gauge, Counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter, serving `/metrics` on `port`.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Weather ingestion and aggregation metrics.
///
/// * `weather_readings_ingested_total{kind,source}`
/// * `weather_readings_rejected_total{reason}`
/// * `weather_averages_stored_total`
/// * `weather_average_cycles_skipped_total`
/// * `weather_latest_value{kind}`
#[derive(Clone)]
pub struct TelemetryMetrics {
    averages_stored: Counter,
    cycles_skipped: Counter,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            averages_stored: counter!("weather_averages_stored_total"),
            cycles_skipped: counter!("weather_average_cycles_skipped_total"),
        }
    }

    /// Record an accepted reading and publish it as the latest value.
    pub fn reading_ingested(&self, kind: &'static str, source: &'static str, value: f64) {
        counter!("weather_readings_ingested_total", "kind" => kind, "source" => source)
            .increment(1);
        gauge!("weather_latest_value", "kind" => kind).set(value);
    }

    /// Record a rejected reading.
    pub fn reading_rejected(&self, reason: &'static str) {
        counter!("weather_readings_rejected_total", "reason" => reason).increment(1);
    }

    pub fn average_stored(&self) {
        self.averages_stored.increment(1);
    }

    pub fn cycle_skipped(&self) {
        self.cycles_skipped.increment(1);
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TelemetryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_without_recorder_are_noops() {
        let metrics = TelemetryMetrics::new();
        metrics.reading_ingested("temperature", "http", 21.5);
        metrics.reading_rejected("unknown_kind");
        metrics.average_stored();
        metrics.cycle_skipped();
    }
}
