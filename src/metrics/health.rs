//! Health check endpoints and Prometheus metrics server
//!
//! This module provides HTTP endpoints for health checks, Prometheus metrics
//! and a read-only queue board for the walk-in queue service using Axum. The
//! front-door routes from [`crate::service::api`] are served alongside.

use crate::metrics::collector::MetricsCollector;
use crate::service::health::{HealthCheck, HealthStatus, ServiceProbe};
use crate::types::{EntryStatus, QueueEntry};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "walkin-queue";

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub probe: Option<ServiceProbe>,
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                probe: None,
            },
            shutdown_tx,
        }
    }

    /// Attach the running service so health and queue endpoints can answer
    pub fn with_probe(mut self, probe: ServiceProbe) -> Self {
        self.state.probe = Some(probe);
        self
    }

    /// Start the health server
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr).await?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    pub(crate) fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .route("/queue", get(queue_handler))
            .merge(crate::service::api::routes())
            .with_state(self.state.clone())
    }

    /// Stop the health server
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping health server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }

        Ok(())
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats",
            "/queue",
            "/estimate",
            "/tickets"
        ]
    }))
}

pub(crate) fn not_initialized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": "unhealthy",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "error": "Service not initialized"
        })),
    )
}

/// Lightweight health check endpoint handler
async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let Some(probe) = &state.probe else {
        return not_initialized();
    };

    let status = HealthCheck::liveness_check(probe)
        .await
        .unwrap_or(HealthStatus::Unhealthy);
    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match &state.probe {
        Some(probe) => match HealthCheck::readiness_check(probe).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
            Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
            Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
            }
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Liveness check requested");

    match &state.probe {
        Some(probe) => match HealthCheck::liveness_check(probe).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
            _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Metrics endpoint requested");

    match HealthEndpoints::get_metrics_text(state.metrics_collector.clone()).await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Detailed service statistics (for debugging/human consumption)
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    let Some(probe) = &state.probe else {
        return not_initialized();
    };

    match HealthCheck::check(probe).await {
        Ok(health) => (
            StatusCode::OK,
            Json(json!({
                "service": {
                    "name": health.service,
                    "version": health.version,
                    "status": health.status,
                    "uptime": health.stats.uptime_info
                },
                "visitors": {
                    "waiting": health.stats.waiting,
                    "in_service": health.stats.in_service,
                    "unroutable": health.stats.unroutable,
                    "check_ins": health.stats.check_ins,
                    "serviced": health.stats.visitors_serviced
                },
                "components": health.checks,
                "health": health,
                "timestamp": Utc::now()
            })),
        ),
        Err(e) => {
            error!("Failed to get stats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "service": { "name": SERVICE_NAME, "status": "error" },
                    "error": "Failed to get service stats",
                    "timestamp": Utc::now()
                })),
            )
        }
    }
}

/// Display-board view: ticket numbers only, no contact details
fn board_row(entry: &QueueEntry) -> serde_json::Value {
    json!({
        "ticket": entry.ticket_number,
        "status": entry.status,
        "counter": entry.assigned_counter,
        "checked_in_at": entry.check_in_time,
        "estimated_completion_time": entry.estimated_completion_time,
    })
}

/// Current queue plus a fresh wait estimate for the next visitor
async fn queue_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Queue board requested");

    let Some(probe) = &state.probe else {
        return not_initialized();
    };

    let manager = &probe.queue_manager;
    let snapshot = match manager.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Failed to load queue for board: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Queue unavailable" })),
            );
        }
    };

    let mut waiting: Vec<&QueueEntry> = snapshot
        .queue
        .iter()
        .filter(|e| e.status == EntryStatus::Waiting)
        .collect();
    waiting.sort_by_key(|e| e.fifo_key());

    let in_service: Vec<serde_json::Value> = snapshot
        .queue
        .iter()
        .filter(|e| e.status == EntryStatus::InService)
        .map(board_row)
        .collect();

    let estimate = match manager.estimate_wait(Utc::now()).await {
        Ok(estimate) => json!(estimate),
        Err(e) => {
            warn!("Wait estimate unavailable for board: {}", e);
            serde_json::Value::Null
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "waiting": waiting.into_iter().map(board_row).collect::<Vec<_>>(),
            "in_service": in_service,
            "estimate": estimate,
            "timestamp": Utc::now()
        })),
    )
}

/// Health endpoints for programmatic access
pub struct HealthEndpoints;

impl HealthEndpoints {
    /// Get health status as JSON
    pub async fn get_health_status(probe: Option<&ServiceProbe>) -> Result<serde_json::Value> {
        match probe {
            Some(probe) => {
                let status = HealthCheck::liveness_check(probe)
                    .await
                    .unwrap_or(HealthStatus::Unhealthy);
                Ok(json!({ "status": status, "service": probe.service_name }))
            }
            None => Ok(json!({
                "status": "unhealthy",
                "service": SERVICE_NAME,
                "error": "Service not initialized"
            })),
        }
    }

    /// Get metrics as Prometheus text format
    pub async fn get_metrics_text(metrics_collector: Arc<MetricsCollector>) -> Result<String> {
        let metric_families = metrics_collector.registry().gather();
        TextEncoder::new()
            .encode_to_string(&metric_families)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AssignmentEngine, Counter, CounterRoster};
    use crate::events::NoopEventPublisher;
    use crate::queue::{QueueManager, QueueSettings};
    use crate::store::InMemoryQueueStore;
    use crate::types::{CheckInRequest, ServiceRequest};
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tokio::sync::RwLock;
    use tower::ServiceExt; // for oneshot

    fn collector() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new().expect("Failed to create collector"))
    }

    fn probe() -> ServiceProbe {
        let roster = CounterRoster::new(vec![Counter::new("Room 1", ["x"])]).unwrap();
        let manager = QueueManager::new(
            Arc::new(InMemoryQueueStore::new()),
            AssignmentEngine::new(roster),
            Arc::new(NoopEventPublisher),
            QueueSettings::default(),
        )
        .unwrap();

        ServiceProbe {
            service_name: SERVICE_NAME.to_string(),
            queue_manager: Arc::new(manager),
            is_running: Arc::new(RwLock::new(true)),
            started_at: Utc::now(),
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let app = HealthServer::new(HealthServerConfig::default(), collector()).create_router();

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["service"], SERVICE_NAME);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let collector = collector();
        collector.record_rejection("queue_full");
        collector.update_health_status(2);

        let app = HealthServer::new(HealthServerConfig::default(), collector).create_router();
        let response = app.oneshot(get("/metrics")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));
    }

    #[tokio::test]
    async fn test_endpoints_without_probe() {
        let app = HealthServer::new(HealthServerConfig::default(), collector()).create_router();

        for uri in ["/health", "/ready", "/alive", "/stats", "/queue"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_endpoints_with_probe() {
        let app = HealthServer::new(HealthServerConfig::default(), collector())
            .with_probe(probe())
            .create_router();

        for uri in ["/health", "/ready", "/alive"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }

        let response = app.oneshot(get("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let health: HealthCheck = serde_json::from_value(body["health"].clone()).unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_queue_board_hides_contact_details() {
        let probe = probe();
        let manager = probe.queue_manager.clone();
        for name in ["Ana", "Ben"] {
            manager
                .check_in(CheckInRequest {
                    name: name.to_string(),
                    phone: "555-0100".to_string(),
                    requested_services: vec![ServiceRequest::new("Intake", "x", 10)],
                })
                .await
                .unwrap();
        }
        manager.run_tick(Utc::now()).await.unwrap();

        let app = HealthServer::new(HealthServerConfig::default(), collector())
            .with_probe(probe)
            .create_router();
        let response = app.oneshot(get("/queue")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["in_service"].as_array().unwrap().len(), 1);
        assert_eq!(body["in_service"][0]["counter"], "Room 1");
        assert_eq!(body["waiting"][0]["ticket"], "A-002");
        assert_eq!(body["estimate"]["source"], "fallback");
        assert!(!body.to_string().contains("555-0100"));
    }

    #[test]
    fn test_health_server_config() {
        let config = HealthServerConfig::default();
        assert_eq!(config.port, 9090);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[tokio::test]
    async fn test_404_handling() {
        let app = HealthServer::new(HealthServerConfig::default(), collector()).create_router();
        let response = app.oneshot(get("/nonexistent")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_programmatic_access() {
        let health_status = HealthEndpoints::get_health_status(None).await.unwrap();
        assert_eq!(health_status["status"], "unhealthy");

        let probe = probe();
        let health_status = HealthEndpoints::get_health_status(Some(&probe)).await.unwrap();
        assert_eq!(health_status["status"], "healthy");

        let metrics_text = HealthEndpoints::get_metrics_text(collector()).await.unwrap();
        assert!(metrics_text.contains("walkin_queue"));
    }
}
