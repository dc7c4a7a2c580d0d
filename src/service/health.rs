//! Health checks and monitoring
//!
//! This module provides health check functionality for the walk-in queue
//! service, including readiness and liveness probes.

use crate::queue::QueueManager;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// What the health endpoints need to see of the running service
#[derive(Clone)]
pub struct ServiceProbe {
    pub service_name: String,
    pub queue_manager: Arc<QueueManager>,
    pub is_running: Arc<RwLock<bool>>,
    pub started_at: DateTime<Utc>,
}

impl ServiceProbe {
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Visitors currently waiting
    pub waiting: usize,
    /// Visitors currently at a counter
    pub in_service: usize,
    /// Total check-ins since service start
    pub check_ins: u64,
    /// Total visitors serviced since service start
    pub visitors_serviced: u64,
    /// Waiting visitors no counter can serve
    pub unroutable: usize,
    /// Service uptime information
    pub uptime_info: String,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(probe: &ServiceProbe) -> Result<Self> {
        let mut checks = Vec::new();

        checks.push(Self::check_service_running(probe).await);
        checks.push(Self::check_queue_manager(probe).await);
        checks.push(Self::check_counter_coverage(probe).await);

        let status = Self::overall_status(&checks);
        let stats = Self::gather_service_stats(probe).await;

        Ok(HealthCheck {
            status,
            service: probe.service_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(probe: &ServiceProbe) -> Result<HealthStatus> {
        if probe.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(probe: &ServiceProbe) -> Result<HealthStatus> {
        if !probe.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_queue_manager(probe).await.status)
    }

    /// Unhealthy wins over degraded, degraded over healthy
    fn overall_status(checks: &[ComponentCheck]) -> HealthStatus {
        if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Check if service is running
    async fn check_service_running(probe: &ServiceProbe) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if probe.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Check the queue manager can read the store
    async fn check_queue_manager(probe: &ServiceProbe) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match probe.queue_manager.snapshot().await {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Queue store read failed during health check: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Queue store unavailable: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "queue_manager".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Waiting visitors the engine can never place degrade the service
    async fn check_counter_coverage(probe: &ServiceProbe) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match probe.queue_manager.get_stats().await {
            Ok(stats) if stats.unroutable > 0 => (
                HealthStatus::Degraded,
                Some(format!(
                    "{} waiting visitor(s) cannot be placed on any counter",
                    stats.unroutable
                )),
            ),
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (
                HealthStatus::Degraded,
                Some(format!("Stats check failed: {}", e)),
            ),
        };

        ComponentCheck {
            name: "counter_coverage".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Gather current service statistics
    async fn gather_service_stats(probe: &ServiceProbe) -> ServiceStats {
        let uptime = Utc::now() - probe.started_at;
        let uptime_info = format!("Up {} minutes", uptime.num_minutes().max(0));

        match probe.queue_manager.get_stats().await {
            Ok(stats) => ServiceStats {
                waiting: stats.waiting,
                in_service: stats.in_service,
                check_ins: stats.check_ins,
                visitors_serviced: stats.visitors_serviced,
                unroutable: stats.unroutable,
                uptime_info,
            },
            Err(e) => {
                debug!("Failed to get queue stats for health check: {}", e);
                ServiceStats {
                    uptime_info,
                    ..Default::default()
                }
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AssignmentEngine, Counter, CounterRoster};
    use crate::events::NoopEventPublisher;
    use crate::queue::QueueSettings;
    use crate::store::InMemoryQueueStore;
    use crate::types::{CheckInRequest, ServiceRequest};

    fn probe(running: bool) -> ServiceProbe {
        let manager = QueueManager::new(
            Arc::new(InMemoryQueueStore::new()),
            AssignmentEngine::new(CounterRoster::new(vec![Counter::new("Room 1", ["x"])]).unwrap()),
            Arc::new(NoopEventPublisher),
            QueueSettings::default(),
        )
        .unwrap();

        ServiceProbe {
            service_name: "walkin-queue".to_string(),
            queue_manager: Arc::new(manager),
            is_running: Arc::new(RwLock::new(running)),
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_running_service_is_healthy() {
        let probe = probe(true);
        let health = HealthCheck::check(&probe).await.unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.checks.len(), 3);
        assert_eq!(
            HealthCheck::readiness_check(&probe).await.unwrap(),
            HealthStatus::Healthy
        );
        assert!(health.to_json().unwrap().contains("\"healthy\""));
    }

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let probe = probe(false);
        assert_eq!(
            HealthCheck::liveness_check(&probe).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::check(&probe).await.unwrap().status,
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_unroutable_visitors_degrade_health() {
        let probe = probe(true);
        probe
            .queue_manager
            .check_in(CheckInRequest {
                name: "Ana".to_string(),
                phone: "555-0100".to_string(),
                requested_services: vec![ServiceRequest::new("Notary", "notary", 15)],
            })
            .await
            .unwrap();
        probe.queue_manager.run_tick(Utc::now()).await.unwrap();

        let health = HealthCheck::check(&probe).await.unwrap();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.stats.unroutable, 1);
        assert_eq!(health.stats.waiting, 1);
    }
}
