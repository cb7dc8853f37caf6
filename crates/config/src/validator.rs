use crate::*;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Station name is required")]
    MissingStationName,

    #[error("Invalid aggregation window: {0}. Use seconds or a unit suffix (e.g. 10s, 1m, 5m, 1h)")]
    InvalidWindow(String),

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("{field}: port {port} is not usable")]
    InvalidPort { field: String, port: u16 },

    #[error("HTTP and metrics ports must differ, both are {port}")]
    PortConflict { port: u16 },

    #[error("Storage: {message}")]
    InvalidStorage { message: String },

    #[error("MQTT: {message}")]
    InvalidMqtt { message: String },

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Environment variable '{var}' is missing or invalid: {message}")]
    InvalidEnvVar { var: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

/// Longest accepted aggregation window (366 days).
pub const MAX_WINDOW_SECONDS: u64 = 366 * 86_400;

fn window_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([0-9]+)([smhd]?)$").expect("window pattern is valid"))
}

/// Length in seconds of a window string such as `10s`, `5m`, `1h` or `300`.
///
/// Digits followed by an optional unit, no sign or inner whitespace.
/// Zero and anything above [`MAX_WINDOW_SECONDS`] yield `None`.
pub fn window_seconds(window: &str) -> Option<u64> {
    let caps = window_regex().captures(window.trim())?;
    let amount: u64 = caps[1].parse().ok()?;
    let unit = match &caps[2] {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return None,
    };
    amount
        .checked_mul(unit)
        .filter(|s| (1..=MAX_WINDOW_SECONDS).contains(s))
}

pub fn validate_config(config: &MasterConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_station(&config.station, &mut report);
    validate_server(config, &mut report);
    validate_storage(&config.storage, &mut report);
    validate_aggregation(&config.aggregation, &mut report);
    validate_mqtt(&config.mqtt, &mut report);
    validate_viewer(&config.viewer, &mut report);

    if is_unknown_log_format(&config.logging.format) {
        report.add_error(ValidationError::InvalidLogFormat(config.logging.format.clone()));
    }

    report
}

fn is_unknown_log_format(format: &str) -> bool {
    !matches!(
        format.trim().to_lowercase().as_str(),
        "pretty" | "json" | "compact"
    )
}

fn check_env_placeholder(field: &str, value: &str, report: &mut ValidationReport) {
    if has_unresolved_env_vars(value) {
        report.add_error(ValidationError::InvalidEnvVar {
            var: field.to_string(),
            message: format!("unresolved placeholder in '{}'", value),
        });
    }
}

fn validate_station(station: &StationConfig, report: &mut ValidationReport) {
    if station.name.trim().is_empty() {
        report.add_error(ValidationError::MissingStationName);
    }
}

fn validate_server(config: &MasterConfig, report: &mut ValidationReport) {
    let server = &config.server;

    if server.port == 0 {
        report.add_error(ValidationError::InvalidPort {
            field: "server.port".to_string(),
            port: server.port,
        });
    }
    if server.request_timeout_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "server.request_timeout_seconds".to_string(),
        });
    }
    if server.static_dir.is_none() {
        report.add_default("server.static_dir", "none (dashboard not served)");
    }

    if config.metrics.enabled {
        if config.metrics.port == 0 {
            report.add_error(ValidationError::InvalidPort {
                field: "metrics.port".to_string(),
                port: 0,
            });
        } else if config.metrics.port == server.port {
            report.add_error(ValidationError::PortConflict { port: server.port });
        }
    }
}

fn validate_storage(storage: &StorageConfig, report: &mut ValidationReport) {
    check_env_placeholder("storage.database_url", &storage.database_url, report);

    if !storage.database_url.starts_with("sqlite:") {
        report.add_error(ValidationError::InvalidStorage {
            message: format!(
                "database_url must be a sqlite URL (sqlite://path or sqlite::memory:), got '{}'",
                storage.database_url
            ),
        });
    }
    if storage.max_connections == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "storage.max_connections".to_string(),
        });
    }
    if storage.database_url.contains(":memory:") {
        report.add_warning(
            "storage.database_url",
            "In-memory database: readings are lost on restart",
        );
    }
}

fn validate_aggregation(aggregation: &AggregationConfig, report: &mut ValidationReport) {
    let window = window_seconds(&aggregation.window);
    if window.is_none() {
        report.add_error(ValidationError::InvalidWindow(aggregation.window.clone()));
    }

    for (field, value) in [
        ("aggregation.check_interval_seconds", aggregation.check_interval_seconds),
        ("aggregation.raw_lookback_minutes", aggregation.raw_lookback_minutes),
    ] {
        if value == 0 {
            report.add_error(ValidationError::InvalidPositiveInteger {
                field: field.to_string(),
            });
        }
    }
    for (field, value) in [
        ("aggregation.history_limit", aggregation.history_limit),
        ("aggregation.history_max", aggregation.history_max),
    ] {
        if value == 0 {
            report.add_error(ValidationError::InvalidPositiveInteger {
                field: field.to_string(),
            });
        }
    }

    if aggregation.history_limit > aggregation.history_max {
        report.add_warning(
            "aggregation.history_limit",
            "history_limit exceeds history_max and will be capped",
        );
    }

    if let Some(window) = window {
        if aggregation.check_interval_seconds > window {
            report.add_warning(
                "aggregation.check_interval_seconds",
                "Check interval is longer than the window; some readings will never be averaged",
            );
        }
        if aggregation.min_spacing_seconds > window {
            report.add_warning(
                "aggregation.min_spacing_seconds",
                "Minimum spacing is longer than the window; averages will leave gaps",
            );
        }
    }
}

fn validate_mqtt(mqtt: &MqttConfig, report: &mut ValidationReport) {
    if !mqtt.enabled {
        return;
    }

    check_env_placeholder("mqtt.broker_host", &mqtt.broker_host, report);

    if mqtt.broker_host.trim().is_empty() {
        report.add_error(ValidationError::InvalidMqtt {
            message: "broker_host is required".to_string(),
        });
    }
    if mqtt.broker_port == 0 {
        report.add_error(ValidationError::InvalidPort {
            field: "mqtt.broker_port".to_string(),
            port: 0,
        });
    }
    if mqtt.temperature_topic.trim().is_empty() || mqtt.humidity_topic.trim().is_empty() {
        report.add_error(ValidationError::InvalidMqtt {
            message: "temperature_topic and humidity_topic are required".to_string(),
        });
    } else if mqtt.temperature_topic == mqtt.humidity_topic {
        report.add_error(ValidationError::InvalidMqtt {
            message: format!(
                "temperature and humidity topics must differ, both are '{}'",
                mqtt.temperature_topic
            ),
        });
    }
    if mqtt.qos > 2 {
        report.add_error(ValidationError::InvalidMqtt {
            message: format!("qos must be 0, 1 or 2, got {}", mqtt.qos),
        });
    }
    if mqtt.keep_alive_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "mqtt.keep_alive_seconds".to_string(),
        });
    }
    if mqtt.broker_host == default_broker_host() {
        report.add_warning(
            "mqtt.broker_host",
            "Public broker in use; anyone can publish to these topics",
        );
    }
}

fn validate_viewer(viewer: &ViewerConfig, report: &mut ValidationReport) {
    if viewer.enabled && viewer.row_limit == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "viewer.row_limit".to_string(),
        });
    }
    if viewer.enabled && viewer.refresh_seconds == 0 {
        report.add_default("viewer.refresh_seconds", "0 (auto refresh disabled)");
    }
}
