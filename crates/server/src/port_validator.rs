//! Port checks run before the server binds
//!
//! Checking a port and binding it later is racy; the bind in
//! [`HttpServer::run`](crate::HttpServer) is what counts. These checks give
//! an early, readable error at startup.

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Check that the HTTP port (and metrics port, if enabled) can be bound.
pub async fn validate_ports_available(config: &ServerConfig) -> Result<()> {
    info!("Validating server ports...");

    let mut ports_to_check = vec![("HTTP", config.http_port)];
    if let Some(port) = config.metrics_port {
        ports_to_check.push(("metrics", port));
    }

    for (purpose, port) in ports_to_check {
        validate_single_port(&config.host, port, purpose).await?;
    }

    info!("All server ports validated successfully");
    Ok(())
}

async fn validate_single_port(host: &str, port: u16, purpose: &str) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    debug!("Checking {} port {}", purpose, port);

    match TcpListener::bind(&addr).await {
        Ok(listener) => {
            let local_addr = listener
                .local_addr()
                .map_err(|e| ServerError::bind(addr.clone(), e))?;
            drop(listener);

            debug!("{} port {} is available ({})", purpose, port, local_addr);
            Ok(())
        }
        Err(e) => {
            error!("{} port {} is NOT available: {}", purpose, port, e);
            Err(ServerError::port_in_use(port, e.to_string()))
        }
    }
}

/// Returns `true` if binding `host:port` fails right now.
pub async fn is_port_in_use(host: &str, port: u16) -> bool {
    let addr = format!("{}:{}", host, port);
    TcpListener::bind(&addr).await.is_err()
}

/// First bindable port at or above `start_port`.
pub async fn find_available_port(host: &str, start_port: u16) -> Option<u16> {
    for port in start_port..=u16::MAX {
        if !is_port_in_use(host, port).await {
            return Some(port);
        }
    }
    None
}

/// Reject port 0 and a metrics port equal to the HTTP port.
pub fn validate_config_ports(config: &ServerConfig) -> Result<()> {
    if config.http_port == 0 {
        return Err(ServerError::ConfigError("HTTP port cannot be 0".to_string()));
    }
    match config.metrics_port {
        Some(0) => Err(ServerError::ConfigError("metrics port cannot be 0".to_string())),
        Some(port) if port == config.http_port => Err(ServerError::ConfigError(format!(
            "metrics port {} conflicts with the HTTP port",
            port
        ))),
        _ => Ok(()),
    }
}
