//! WeatherHub CLI and Server Binary
//!
//! Entry point for the telemetry service. `start` wires the SQLite store,
//! the averaging worker, the optional MQTT ingestor and the HTTP server;
//! `validate` and `init` manage the configuration file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::Router;
use cli::{Cli, Commands};
use config::{
    generate_default_config, load_config, save_config, validate_config, MasterConfig,
    ValidationReport,
};
use observability::{init_logging, init_metrics, LogFormat};
use server::{
    drain_tasks, health_routes, validate_config_ports, validate_ports_available, ComponentStatus,
    HealthCheck, HealthState, HttpServer, Server, ServerConfig, ShutdownController,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::{
    viewer_routes, weather_routes, ApiSettings, AveragingWorker, MqttIngestor, MqttSettings,
    ReadingStore, SqliteReadingStore, TelemetryService, ViewerState, WeatherApiState,
    WorkerConfig,
};
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "weatherhub";

/// How long background tasks get to stop after the server exits
const TASK_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start {
            config,
            port,
            database,
            mqtt,
            log_format,
        } => {
            let overrides = StartOverrides {
                port,
                database,
                mqtt,
                log_format: log_format.map(|f| f.as_str().to_string()),
            };
            start_command(config, overrides).await
        }
        Commands::Validate { config } => {
            init_logging(SERVICE_NAME, "info", LogFormat::Pretty)?;
            info!("Executing 'validate' command");
            validate_command(config)
        }
        Commands::Init { output } => {
            init_logging(SERVICE_NAME, "info", LogFormat::Pretty)?;
            info!("Executing 'init' command");
            init_command(output)
        }
    }
}

/// Values from the command line that win over the configuration file.
#[derive(Debug, Default)]
struct StartOverrides {
    port: Option<u16>,
    database: Option<String>,
    mqtt: bool,
    log_format: Option<String>,
}

fn apply_overrides(config: &mut MasterConfig, overrides: StartOverrides) {
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(url) = overrides.database {
        config.storage.database_url = url;
    }
    if overrides.mqtt {
        config.mqtt.enabled = true;
    }
    if let Some(format) = overrides.log_format {
        config.logging.format = format;
    }
}

fn load_or_default(path: Option<&Path>) -> Result<MasterConfig> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => Ok(MasterConfig::default()),
    }
}

async fn start_command(config_path: Option<PathBuf>, overrides: StartOverrides) -> Result<()> {
    let mut config = load_or_default(config_path.as_deref())?;
    apply_overrides(&mut config, overrides);

    let format = LogFormat::parse(&config.logging.format).unwrap_or_default();
    init_logging(SERVICE_NAME, &config.logging.level, format)?;

    match &config_path {
        Some(path) => info!(?path, "WeatherHub starting"),
        None => info!("WeatherHub starting with built-in defaults"),
    }

    let report = validate_config(&config);
    log_report(&report);
    if !report.is_valid() {
        anyhow::bail!("Cannot start WeatherHub due to configuration errors");
    }

    let server_config = ServerConfig::from_settings(&config.server, &config.metrics);
    validate_config_ports(&server_config)?;
    validate_ports_available(&server_config).await?;

    if let Some(port) = server_config.metrics_port {
        init_metrics(port)?;
    }

    let store = Arc::new(
        SqliteReadingStore::new(&config.storage.database_url, config.storage.max_connections)
            .await
            .with_context(|| format!("Failed to open database {}", config.storage.database_url))?,
    );
    info!(url = %config.storage.database_url, "Connected to database");

    let service = Arc::new(TelemetryService::new(store.clone()));
    service.seed_latest().await.context("Failed to load latest values")?;

    let shutdown = ShutdownController::with_ctrl_c();
    let mut tasks = Vec::new();

    let worker = AveragingWorker::new(service.clone(), WorkerConfig::from_config(&config.aggregation)?);
    let worker_token = shutdown.child_token();
    tasks.push((
        "averaging-worker",
        tokio::spawn(async move { worker.run(worker_token).await }),
    ));

    if config.mqtt.enabled {
        let ingestor = MqttIngestor::new(service.clone(), MqttSettings::from_config(&config.mqtt)?);
        let mqtt_token = shutdown.child_token();
        tasks.push((
            "mqtt-ingestor",
            tokio::spawn(async move { ingestor.run(mqtt_token).await }),
        ));
    } else {
        debug!("MQTT ingestion disabled");
    }

    let router = build_router(&config, service, store.clone())?;
    let server = HttpServer::with_layers(server_config, router);

    info!(
        station = %config.station.name,
        port = config.server.port,
        viewer = config.viewer.enabled,
        mqtt = config.mqtt.enabled,
        "Serving weather API"
    );

    let result = server.run(shutdown.token()).await;
    if let Err(e) = &result {
        error!(%e, "HTTP server stopped with an error");
    }

    if !shutdown.is_cancelled() {
        shutdown.shutdown();
    }
    let finished = drain_tasks(tasks, TASK_GRACE).await;
    debug!(finished, "Background tasks drained");

    store.close().await;
    info!("WeatherHub stopped");

    result.map_err(Into::into)
}

/// All HTTP routes: JSON API, health and (if enabled) the database viewer.
fn build_router(
    config: &MasterConfig,
    service: Arc<TelemetryService>,
    store: Arc<dyn ReadingStore>,
) -> Result<Router> {
    let api_state = Arc::new(WeatherApiState::new(
        service,
        ApiSettings::from_config(&config.aggregation)?,
    ));
    let health = HealthState::new(config.station.name.clone())
        .with_check(Arc::new(StoreHealthCheck { store: store.clone() }));

    let mut router = weather_routes(api_state).merge(health_routes(Arc::new(health)));

    if config.viewer.enabled {
        let viewer = Arc::new(ViewerState::new(store, &config.viewer));
        router = router.merge(viewer_routes(viewer));
    }

    Ok(router)
}

/// Probes the reading store for `/health/detailed`.
struct StoreHealthCheck {
    store: Arc<dyn ReadingStore>,
}

#[async_trait]
impl HealthCheck for StoreHealthCheck {
    async fn check(&self) -> ComponentStatus {
        let started = Instant::now();
        let status = match self.store.counts().await {
            Ok(counts) => ComponentStatus::healthy(
                "database",
                format!("{} raw readings, {} averages", counts.raw_readings, counts.averages),
            ),
            Err(e) => ComponentStatus::unhealthy("database", e.to_string()),
        };
        status.with_latency(started)
    }
}

fn log_report(report: &ValidationReport) {
    if !report.warnings.is_empty() {
        warn!("Configuration warnings:");
        for warning in &report.warnings {
            warn!(field = %warning.field, message = %warning.message);
        }
    }
    for default in &report.defaults_applied {
        debug!(field = %default.field, value = %default.value, "Default applied");
    }
    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
    }
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Station: {}", config.station.name);
    println!("HTTP: {}:{}", config.server.host, config.server.port);
    println!("Database: {}", config.storage.database_url);
    println!(
        "Averaging: {} window every {}s",
        config.aggregation.window, config.aggregation.check_interval_seconds
    );
    if config.mqtt.enabled {
        println!(
            "MQTT: {}:{} ({}, {})",
            config.mqtt.broker_host,
            config.mqtt.broker_port,
            config.mqtt.temperature_topic,
            config.mqtt.humidity_topic
        );
    } else {
        println!("MQTT: disabled");
    }

    Ok(())
}

fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!("  - HTTP server on port {}", config.server.port);
    println!("  - SQLite storage at {}", config.storage.database_url);
    println!("  - {} averaging window", config.aggregation.window);
    println!("  - MQTT ingestion (disabled until mqtt.enabled is set)");
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to customize settings");
    println!(
        "  2. Run 'weatherhub validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  3. Run 'weatherhub start --config {:?}' to start the server",
        output_path
    );

    Ok(())
}
