//! Health endpoints
//!
//! `GET /health` answers as long as the process serves requests.
//! `GET /health/detailed` also runs every registered [`HealthCheck`] and
//! returns 503 when one of them fails.

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Result of a single dependency check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentStatus {
    pub component: String,
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub detail: Option<String>,
    pub error: Option<String>,
}

impl ComponentStatus {
    pub fn healthy(component: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            healthy: true,
            latency_ms: None,
            detail: Some(detail.into()),
            error: None,
        }
    }

    pub fn unhealthy(component: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            healthy: false,
            latency_ms: None,
            detail: None,
            error: Some(error.into()),
        }
    }

    pub fn with_latency(mut self, started: Instant) -> Self {
        self.latency_ms = Some(started.elapsed().as_millis() as u64);
        self
    }
}

/// A dependency probed by the detailed health endpoint.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> ComponentStatus;
}

/// Shared state for the health routes
#[derive(Clone)]
pub struct HealthState {
    pub service_name: String,
    pub start_time: Instant,
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthState {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            start_time: Instant::now(),
            checks: Vec::new(),
        }
    }

    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Run every registered check in order.
    pub async fn run_checks(&self) -> Vec<ComponentStatus> {
        let mut results = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            results.push(check.check().await);
        }
        results
    }
}

/// Liveness handler
pub async fn health_handler(State(state): State<Arc<HealthState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Health including dependency checks
pub async fn detailed_health_handler(
    State(state): State<Arc<HealthState>>,
) -> (StatusCode, Json<Value>) {
    let components = state.run_checks().await;
    let all_healthy = components.iter().all(|c| c.healthy);
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let health = json!({
        "status": if all_healthy { "healthy" } else { "degraded" },
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
        "components": components,
        "healthy": all_healthy,
    });

    (status_code, Json(health))
}

pub fn health_routes(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/detailed", get(detailed_health_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct Fixed(bool);

    #[async_trait]
    impl HealthCheck for Fixed {
        async fn check(&self) -> ComponentStatus {
            if self.0 {
                ComponentStatus::healthy("fixed", "fine")
            } else {
                ComponentStatus::unhealthy("fixed", "down")
            }
        }
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_liveness() {
        let router = health_routes(Arc::new(HealthState::new("weatherhub")));
        let (status, body) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "weatherhub");
    }

    #[tokio::test]
    async fn test_detailed_reports_failures() {
        let state = HealthState::new("weatherhub")
            .with_check(Arc::new(Fixed(true)))
            .with_check(Arc::new(Fixed(false)));
        let (status, body) = get_json(health_routes(Arc::new(state)), "/health/detailed").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["components"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_detailed_without_checks_is_healthy() {
        let router = health_routes(Arc::new(HealthState::new("weatherhub")));
        let (status, body) = get_json(router, "/health/detailed").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
    }
}
