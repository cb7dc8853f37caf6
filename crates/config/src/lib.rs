//! Configuration model for WeatherHub.
//!
//! Every section carries serde defaults, so an empty YAML document (or no
//! file at all) yields a runnable configuration.

use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MasterConfig {
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Identity of the station, reported by `/health`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StationConfig {
    #[serde(default = "default_station_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: default_station_name(),
            description: String::new(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_enabled")]
    pub cors_enabled: bool,
    /// Directory served at `/` (the dashboard). Not served when unset.
    #[serde(default)]
    pub static_dir: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
            request_timeout_seconds: default_request_timeout(),
            cors_enabled: default_enabled(),
            static_dir: None,
        }
    }
}

/// Embedded database settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// sqlx SQLite URL, e.g. `sqlite://weather_data.db` or `sqlite::memory:`.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Periodic averaging and read-endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AggregationConfig {
    /// Trailing window length, e.g. `5m`, `1m`, `10s`.
    #[serde(default = "default_window")]
    pub window: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// Minimum spacing between two stored averages.
    #[serde(default = "default_min_spacing")]
    pub min_spacing_seconds: u64,
    #[serde(default = "default_enabled")]
    pub run_on_startup: bool,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_history_max")]
    pub history_max: usize,
    #[serde(default = "default_raw_lookback_minutes")]
    pub raw_lookback_minutes: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            check_interval_seconds: default_check_interval(),
            min_spacing_seconds: default_min_spacing(),
            run_on_startup: default_enabled(),
            history_limit: default_history_limit(),
            history_max: default_history_max(),
            raw_lookback_minutes: default_raw_lookback_minutes(),
        }
    }
}

/// MQTT subscription settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MqttConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_broker_host")]
    pub broker_host: String,
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_temperature_topic")]
    pub temperature_topic: String,
    #[serde(default = "default_humidity_topic")]
    pub humidity_topic: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
    /// 0, 1 or 2.
    #[serde(default)]
    pub qos: u8,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker_host: default_broker_host(),
            broker_port: default_broker_port(),
            client_id: default_client_id(),
            temperature_topic: default_temperature_topic(),
            humidity_topic: default_humidity_topic(),
            keep_alive_seconds: default_keep_alive(),
            reconnect_delay_seconds: default_reconnect_delay(),
            qos: 0,
        }
    }
}

/// HTML table viewer settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ViewerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_viewer_row_limit")]
    pub row_limit: usize,
    #[serde(default = "default_viewer_refresh")]
    pub refresh_seconds: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            row_limit: default_viewer_row_limit(),
            refresh_seconds: default_viewer_refresh(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty`, `json` or `compact`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: MasterConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, MasterConfig::default());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.aggregation.window, "5m");
        assert_eq!(config.aggregation.history_limit, 12);
        assert!(!config.mqtt.enabled);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let yaml = r#"
aggregation:
  window: 10s
mqtt:
  enabled: true
  temperature_topic: home/temp
"#;
        let config: MasterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.aggregation.window, "10s");
        assert_eq!(config.aggregation.check_interval_seconds, 60);
        assert!(config.mqtt.enabled);
        assert_eq!(config.mqtt.temperature_topic, "home/temp");
        assert_eq!(config.mqtt.humidity_topic, "weatherhub/humidity");
    }
}
