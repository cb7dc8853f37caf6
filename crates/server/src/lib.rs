//! Server infrastructure for WeatherHub
//!
//! - [`HttpServer`]: Axum listener with graceful shutdown
//! - [`apply_http_layers`]: static files, timeout, CORS and tracing
//! - [`ShutdownController`]: cancellation shared by the server and background tasks
//! - [`health_routes`]: liveness and dependency checks
//!
//! ```ignore
//! use server::{HttpServer, ServerConfig, ServerExt};
//!
//! let server = HttpServer::with_layers(ServerConfig::new("0.0.0.0", 3000), router);
//! server.run_with_ctrl_c().await?;
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod port_validator;
pub mod shutdown;
pub mod traits;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use health::{health_routes, ComponentStatus, HealthCheck, HealthState};
pub use http::{apply_http_layers, HttpServer};
pub use port_validator::{validate_config_ports, validate_ports_available};
pub use shutdown::{drain_tasks, run_until_shutdown, ShutdownController};
pub use traits::{Server, ServerExt};
