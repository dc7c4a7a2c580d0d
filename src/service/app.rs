//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the queue store,
//! assignment engine, wait-time estimator and monitoring together, and owns
//! the background tasks that keep the queue moving.

use crate::config::AppConfig;
use crate::engine::{AssignmentEngine, TickScheduler};
use crate::events::BroadcastEventPublisher;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::queue::QueueManager;
use crate::service::health::{HealthCheck, HealthStatus, ServiceProbe};
use crate::store::InMemoryQueueStore;
use crate::wait_time::{
    HttpPredictionClient, InMemoryStatisticsTracker, NoJitter, PredictionCollaborator,
    UnavailablePredictionClient, WaitTimeEstimator,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,

    queue_manager: Arc<QueueManager>,

    /// Fan-out of queue events to in-process subscribers
    event_publisher: BroadcastEventPublisher,

    metrics_service: Arc<MetricsService>,

    /// Periodic assignment ticks; `None` until started
    scheduler: Option<TickScheduler>,

    background_tasks: Vec<JoinHandle<()>>,

    is_running: Arc<RwLock<bool>>,

    started_at: DateTime<Utc>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} walk-in queue service", config.service.name);

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let event_publisher = BroadcastEventPublisher::default();
        let queue_manager = Self::initialize_queue_system(
            &config,
            event_publisher.clone(),
            metrics_collector.clone(),
        )?;

        let is_running = Arc::new(RwLock::new(false));
        let started_at = Utc::now();
        let probe = ServiceProbe {
            service_name: config.service.name.clone(),
            queue_manager: queue_manager.clone(),
            is_running: is_running.clone(),
            started_at,
        };
        let metrics_service = Self::initialize_metrics(&config, metrics_collector, probe);

        Ok(Self {
            config,
            queue_manager,
            event_publisher,
            metrics_service,
            scheduler: None,
            background_tasks: Vec::new(),
            is_running,
            started_at,
        })
    }

    /// Start monitoring, the tick scheduler and maintenance tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {} walk-in queue service", self.config.service.name);

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;
        self.start_tick_scheduler();
        self.start_background_tasks();

        info!("Walk-in queue service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of walk-in queue service");

        *self.is_running.write().await = false;

        // The tick in flight finishes before the scheduler exits
        if let Some(scheduler) = self.scheduler.take() {
            match scheduler.shutdown().await {
                Ok(ticks) => info!("Tick scheduler stopped after {} ticks", ticks),
                Err(e) => warn!("Tick scheduler did not stop cleanly: {}", e),
            }
        }

        self.stop_background_tasks().await;

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        }

        let final_stats =
            self.queue_manager
                .get_stats()
                .await
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("Walk-in queue service shutdown completed");

        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn queue_manager(&self) -> Arc<QueueManager> {
        self.queue_manager.clone()
    }

    /// Publisher to subscribe to for queue events
    pub fn event_publisher(&self) -> &BroadcastEventPublisher {
        &self.event_publisher
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Handle used by health checks
    pub fn probe(&self) -> ServiceProbe {
        ServiceProbe {
            service_name: self.config.service.name.clone(),
            queue_manager: self.queue_manager.clone(),
            is_running: self.is_running.clone(),
            started_at: self.started_at,
        }
    }

    fn initialize_metrics(
        config: &AppConfig,
        metrics_collector: Arc<MetricsCollector>,
        probe: ServiceProbe,
    ) -> Arc<MetricsService> {
        info!(
            "Initializing metrics service on port {}",
            config.service.metrics_port
        );

        let health_config = HealthServerConfig {
            port: config.service.metrics_port,
            host: "0.0.0.0".to_string(),
        };

        let health_server =
            Arc::new(HealthServer::new(health_config, metrics_collector.clone()).with_probe(probe));
        Arc::new(MetricsService::new(metrics_collector, health_server))
    }

    /// Build the store, roster, estimator and queue manager
    fn initialize_queue_system(
        config: &AppConfig,
        event_publisher: BroadcastEventPublisher,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Result<Arc<QueueManager>, ServiceError> {
        let roster = config
            .counter_roster()
            .map_err(|e| ServiceError::Configuration {
                message: format!("Invalid counter roster: {}", e),
            })?;
        info!(
            "Counter roster: {}",
            roster
                .counters()
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let estimator_config = config.estimator_config();
        let collaborator: Arc<dyn PredictionCollaborator> = match &config.estimator.prediction_url
        {
            Some(url) => {
                info!("Using prediction collaborator at {}", url);
                Arc::new(
                    HttpPredictionClient::new(url.clone(), estimator_config.prediction_timeout())
                        .map_err(|e| ServiceError::Initialization {
                            message: format!("Failed to create prediction client: {}", e),
                        })?,
                )
            }
            None => {
                info!("No prediction collaborator configured, using fallback estimates");
                Arc::new(UnavailablePredictionClient)
            }
        };

        let mut estimator = WaitTimeEstimator::new(estimator_config, collaborator)
            .map_err(|e| ServiceError::Configuration {
                message: format!("Invalid estimator settings: {}", e),
            })?
            .with_metrics(metrics_collector.clone());
        if !config.estimator.enable_jitter {
            estimator = estimator.with_jitter(Arc::new(NoJitter));
        }

        let manager = QueueManager::new(
            Arc::new(InMemoryQueueStore::new()),
            AssignmentEngine::new(roster),
            Arc::new(event_publisher),
            config.queue_settings(),
        )
        .map_err(|e| ServiceError::Initialization {
            message: format!("Failed to create queue manager: {}", e),
        })?
        .with_metrics(metrics_collector)
        .with_estimator(Arc::new(estimator))
        .with_stats_tracker(Arc::new(InMemoryStatisticsTracker::default()));

        Ok(Arc::new(manager))
    }

    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.metrics_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });
        self.background_tasks.push(metrics_handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("Metrics service started on port {}", port);
        Ok(())
    }

    fn start_tick_scheduler(&mut self) {
        let interval = self.config.tick_interval();
        info!("Starting tick scheduler ({}s interval)", interval.as_secs());
        self.scheduler = Some(TickScheduler::spawn(self.queue_manager.clone(), interval));
    }

    fn start_background_tasks(&mut self) {
        info!("Starting health metrics task (60s interval)...");
        let probe = self.probe();
        let metrics_collector = self.metrics_service.collector();
        let is_running = self.is_running.clone();

        let health_metrics_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            let start_time = tokio::time::Instant::now();

            while *is_running.read().await {
                interval.tick().await;

                let uptime_seconds = start_time.elapsed().as_secs() as i64;
                metrics_collector
                    .service()
                    .uptime_seconds
                    .set(uptime_seconds);

                match HealthCheck::check(&probe).await {
                    Ok(health) => {
                        let status = match health.status {
                            HealthStatus::Healthy => 2,
                            HealthStatus::Degraded => 1,
                            HealthStatus::Unhealthy => 0,
                        };
                        metrics_collector.update_health_status(status);
                        for check in &health.checks {
                            metrics_collector.update_component_health(
                                &check.name,
                                check.status != HealthStatus::Unhealthy,
                            );
                        }
                    }
                    Err(e) => {
                        warn!("Health check failed: {}", e);
                        metrics_collector.update_health_status(0);
                    }
                }

                debug!("Updated service health metrics - uptime: {}s", uptime_seconds);
            }

            info!("Health metrics task stopped");
        });

        self.background_tasks.push(health_metrics_task);
    }

    async fn stop_background_tasks(&mut self) {
        info!("Stopping {} background tasks...", self.background_tasks.len());

        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        // Let aborted tasks unwind
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CounterSettings;
    use crate::types::{CheckInRequest, QueueEvent, ServiceRequest};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        // Ephemeral port so tests never collide
        config.service.metrics_port = 0;
        config.queue.tick_interval_seconds = 1;
        config.estimator.enable_jitter = false;
        config.counters = vec![CounterSettings::new("Room 1", ["x"])];
        config
    }

    #[tokio::test]
    async fn test_app_state_wiring() {
        let app = AppState::new(test_config()).await.unwrap();

        assert!(!app.is_running().await);
        assert_eq!(app.queue_manager().roster().len(), 1);
        assert_eq!(app.config().queue.max_waiting, 20);
        assert!(app.scheduler.is_none());
    }

    #[tokio::test]
    async fn test_invalid_roster_is_configuration_error() {
        let mut config = test_config();
        config.counters = vec![CounterSettings::new("Room 1", Vec::<String>::new())];

        let result = AppState::new(config).await;
        assert!(matches!(result, Err(ServiceError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_start_ticks_and_shutdown() {
        let mut app = AppState::new(test_config()).await.unwrap();
        let mut events = app.event_publisher().subscribe();

        app.queue_manager()
            .check_in(CheckInRequest {
                name: "Ana".to_string(),
                phone: "555-0100".to_string(),
                requested_services: vec![ServiceRequest::new("Intake", "x", 10)],
            })
            .await
            .unwrap();

        app.start().await.unwrap();
        assert!(app.is_running().await);

        // First interval tick fires immediately
        let assigned = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(QueueEvent::TickCompleted(tick)) = events.recv().await {
                    return tick;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(assigned.assignments.len(), 1);

        app.shutdown().await.unwrap();
        assert!(!app.is_running().await);
        assert!(app.background_tasks.is_empty());
    }
}
