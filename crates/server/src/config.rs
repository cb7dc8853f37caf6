//! Server configuration
//!
//! Bind address and HTTP behaviour for the WeatherHub listener.

use crate::error::{Result, ServerError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default port assignments.
pub mod ports {
    /// HTTP API, viewer and dashboard
    pub const DEFAULT_HTTP: u16 = 3000;
    /// Prometheus exporter
    pub const DEFAULT_METRICS: u16 = 9090;
}

/// HTTP server configuration
///
/// ```
/// use server::config::ServerConfig;
///
/// let config = ServerConfig::new("127.0.0.1", 3000)
///     .with_static_dir("public")
///     .with_cors(false);
/// assert_eq!(config.http_port, 3000);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub http_port: u16,
    /// Prometheus exporter port, if metrics are enabled
    pub metrics_port: Option<u16>,
    pub request_timeout: Duration,
    /// Permissive CORS on every route
    pub cors: bool,
    /// Directory served for paths no route matches
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, http_port: u16) -> Self {
        Self {
            host: host.into(),
            http_port,
            ..Self::default()
        }
    }

    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = Some(port);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Build from the `server` and `metrics` config sections.
    pub fn from_settings(server: &config::ServerSettings, metrics: &config::MetricsConfig) -> Self {
        let mut cfg = Self::new(server.host.clone(), server.port)
            .with_request_timeout(Duration::from_secs(server.request_timeout_seconds))
            .with_cors(server.cors_enabled);
        if let Some(dir) = &server.static_dir {
            cfg = cfg.with_static_dir(dir);
        }
        if metrics.enabled {
            cfg = cfg.with_metrics_port(metrics.port);
        }
        cfg
    }

    /// Get HTTP socket address
    pub fn http_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.http_port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.host, self.http_port)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: ports::DEFAULT_HTTP,
            metrics_port: None,
            request_timeout: Duration::from_secs(30),
            cors: true,
            static_dir: None,
        }
    }
}
