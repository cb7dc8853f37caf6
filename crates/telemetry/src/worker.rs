//! Background worker that stores trailing-window averages.
//!
//! Every `check_interval` the worker computes the mean of each kind over
//! `(now - window, now]`, falls back to the latest known values for kinds
//! with no readings in the window, and appends an `avg_data` row. Cycles
//! that come within `min_spacing` of the last stored average are skipped.

use crate::aggregate::AggregationWindow;
use crate::error::{TelemetryError, TelemetryResult};
use crate::service::TelemetryService;
use chrono::{DateTime, Utc};
use config::AggregationConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Averaging worker settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerConfig {
    pub window: AggregationWindow,
    pub check_interval: Duration,
    pub min_spacing: chrono::Duration,
    pub run_on_startup: bool,
}

impl WorkerConfig {
    pub fn from_config(config: &AggregationConfig) -> TelemetryResult<Self> {
        if config.check_interval_seconds == 0 {
            return Err(TelemetryError::ConfigError(
                "check_interval_seconds must be positive".to_string(),
            ));
        }
        let min_spacing = i64::try_from(config.min_spacing_seconds)
            .map(chrono::Duration::seconds)
            .map_err(|_| TelemetryError::ConfigError("min_spacing_seconds is too large".to_string()))?;

        Ok(Self {
            window: AggregationWindow::parse(&config.window)?,
            check_interval: Duration::from_secs(config.check_interval_seconds),
            min_spacing,
            run_on_startup: config.run_on_startup,
        })
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            window: AggregationWindow::FIVE_MINUTES,
            check_interval: Duration::from_secs(60),
            min_spacing: chrono::Duration::minutes(4),
            run_on_startup: true,
        }
    }
}

/// Result of one averaging cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// An average row was stored with this id.
    Stored(i64),
    /// The previous average is more recent than `min_spacing`.
    Skipped,
    /// Neither kind has a window mean or a latest value.
    NoData,
}

/// Periodic averaging worker.
pub struct AveragingWorker {
    service: Arc<TelemetryService>,
    config: WorkerConfig,
    last_stored: Mutex<Option<DateTime<Utc>>>,
}

impl AveragingWorker {
    pub fn new(service: Arc<TelemetryService>, config: WorkerConfig) -> Self {
        Self {
            service,
            config,
            last_stored: Mutex::new(None),
        }
    }

    /// Time of the last successfully stored average.
    pub fn last_stored(&self) -> Option<DateTime<Utc>> {
        *self.last_stored.lock()
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            window = %self.config.window,
            interval_secs = self.config.check_interval.as_secs(),
            run_on_startup = self.config.run_on_startup,
            "Starting averaging worker"
        );

        if self.config.run_on_startup {
            self.log_cycle(self.run_cycle_at(Utc::now()).await);
        }

        let mut timer = tokio::time::interval(self.config.check_interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        timer.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.log_cycle(self.run_cycle_at(Utc::now()).await);
                }
                _ = shutdown.cancelled() => {
                    info!("Averaging worker shutting down");
                    return;
                }
            }
        }
    }

    fn log_cycle(&self, result: TelemetryResult<CycleOutcome>) {
        match result {
            Ok(CycleOutcome::Stored(id)) => {
                info!(id, window = %self.config.window, "Stored window averages")
            }
            Ok(CycleOutcome::Skipped) => debug!("Averaging cycle skipped, last average too recent"),
            Ok(CycleOutcome::NoData) => debug!("No readings yet, nothing to average"),
            Err(e) => error!(error = %e, "Averaging cycle failed"),
        }
    }

    /// Run one cycle as if the clock read `now`.
    #[instrument(skip(self))]
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> TelemetryResult<CycleOutcome> {
        if let Some(last) = self.last_stored() {
            if now - last < self.config.min_spacing {
                self.service.metrics().cycle_skipped();
                return Ok(CycleOutcome::Skipped);
            }
        }

        let Some(record) = self
            .service
            .compute_window_average(now, self.config.window)
            .await?
        else {
            return Ok(CycleOutcome::NoData);
        };

        let id = self.service.store_average(record).await?;
        *self.last_stored.lock() = Some(now);
        Ok(CycleOutcome::Stored(id))
    }
}
