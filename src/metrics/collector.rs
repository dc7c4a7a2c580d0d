//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the walk-in queue service
//! using Prometheus metrics.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the queue service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Assignment engine metrics
    engine_metrics: EngineMetrics,

    /// Wait-time estimator metrics
    estimator_metrics: EstimatorMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Visitors currently waiting
    pub visitors_waiting: IntGauge,

    /// Visitors currently at a counter
    pub visitors_in_service: IntGauge,

    /// Successful check-ins
    pub check_ins_total: IntCounter,

    /// Rejected queue operations by reason
    pub rejections_total: IntCounterVec,

    /// Visitors who finished service
    pub visitors_serviced_total: IntCounter,

    /// Manual staff actions by kind
    pub staff_actions_total: IntCounterVec,

    /// Store writes lost to a concurrent writer
    pub write_conflicts_total: IntCounter,

    /// Time from check-in until placed on a counter
    pub queue_wait_seconds: Histogram,

    /// Queue operation durations
    pub operation_duration: HistogramVec,
}

/// Assignment engine metrics
#[derive(Clone)]
pub struct EngineMetrics {
    /// Ticks executed
    pub ticks_total: IntCounter,

    /// Tick duration including the store round trip
    pub tick_duration: Histogram,

    /// Assignments made by counter
    pub assignments_total: IntCounterVec,

    /// Waiting visitors no configured counter can serve
    pub unroutable_visitors: IntGauge,

    /// Counters with an occupant
    pub counters_busy: IntGauge,
}

/// Wait-time estimator metrics
#[derive(Clone)]
pub struct EstimatorMetrics {
    /// Estimates produced by source (prediction or fallback)
    pub estimates_total: IntCounterVec,

    /// Collaborator calls by outcome
    pub prediction_calls_total: IntCounterVec,

    /// Collaborator call latency
    pub prediction_duration: Histogram,

    /// Most recent estimate in minutes
    pub last_estimate_minutes: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let engine_metrics = EngineMetrics::new(&registry)?;
        let estimator_metrics = EstimatorMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            engine_metrics,
            estimator_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get engine metrics
    pub fn engine(&self) -> &EngineMetrics {
        &self.engine_metrics
    }

    /// Get estimator metrics
    pub fn estimator(&self) -> &EstimatorMetrics {
        &self.estimator_metrics
    }

    /// Refresh the occupancy gauges from a queue snapshot
    pub fn update_queue_gauges(&self, waiting: usize, in_service: usize) {
        self.queue_metrics.visitors_waiting.set(waiting as i64);
        self.queue_metrics.visitors_in_service.set(in_service as i64);
        self.engine_metrics.counters_busy.set(in_service as i64);
    }

    /// Record a successful check-in
    pub fn record_check_in(&self, duration: Duration) {
        self.queue_metrics.check_ins_total.inc();
        self.record_operation("check_in", duration);
    }

    /// Record a rejected operation
    pub fn record_rejection(&self, reason: &str) {
        self.queue_metrics
            .rejections_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a manual staff action
    pub fn record_staff_action(&self, action: &str) {
        self.queue_metrics
            .staff_actions_total
            .with_label_values(&[action])
            .inc();
    }

    /// Record a lost compare-and-swap
    pub fn record_write_conflict(&self) {
        self.queue_metrics.write_conflicts_total.inc();
    }

    /// Record queue operation duration
    pub fn record_operation(&self, operation: &str, duration: Duration) {
        self.queue_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Record one completed tick
    pub fn record_tick(&self, duration: Duration, serviced: usize, unroutable: usize) {
        self.engine_metrics.ticks_total.inc();
        self.engine_metrics
            .tick_duration
            .observe(duration.as_secs_f64());
        self.queue_metrics
            .visitors_serviced_total
            .inc_by(serviced as u64);
        self.engine_metrics
            .unroutable_visitors
            .set(unroutable as i64);
    }

    /// Record a visitor placed on a counter after waiting `waited`
    pub fn record_assignment(&self, counter: &str, waited: Duration) {
        self.engine_metrics
            .assignments_total
            .with_label_values(&[counter])
            .inc();
        self.queue_metrics
            .queue_wait_seconds
            .observe(waited.as_secs_f64());
    }

    /// Record an estimate handed to a visitor
    pub fn record_estimate(&self, source: &str, minutes: u32) {
        self.estimator_metrics
            .estimates_total
            .with_label_values(&[source])
            .inc();
        self.estimator_metrics
            .last_estimate_minutes
            .set(i64::from(minutes));
    }

    /// Record a call to the prediction collaborator
    pub fn record_prediction_call(&self, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };
        self.estimator_metrics
            .prediction_calls_total
            .with_label_values(&[status])
            .inc();
        self.estimator_metrics
            .prediction_duration
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("walkin_queue_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "walkin_queue_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("walkin_queue_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let visitors_waiting =
            IntGauge::new("walkin_queue_visitors_waiting", "Visitors currently waiting")?;
        registry.register(Box::new(visitors_waiting.clone()))?;

        let visitors_in_service = IntGauge::new(
            "walkin_queue_visitors_in_service",
            "Visitors currently at a counter",
        )?;
        registry.register(Box::new(visitors_in_service.clone()))?;

        let check_ins_total =
            IntCounter::new("walkin_queue_check_ins_total", "Total successful check-ins")?;
        registry.register(Box::new(check_ins_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new(
                "walkin_queue_rejections_total",
                "Rejected queue operations by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let visitors_serviced_total = IntCounter::new(
            "walkin_queue_visitors_serviced_total",
            "Visitors who finished service",
        )?;
        registry.register(Box::new(visitors_serviced_total.clone()))?;

        let staff_actions_total = IntCounterVec::new(
            Opts::new("walkin_queue_staff_actions_total", "Manual staff actions"),
            &["action"],
        )?;
        registry.register(Box::new(staff_actions_total.clone()))?;

        let write_conflicts_total = IntCounter::new(
            "walkin_queue_write_conflicts_total",
            "Store writes lost to a concurrent writer",
        )?;
        registry.register(Box::new(write_conflicts_total.clone()))?;

        let queue_wait_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "walkin_queue_wait_seconds",
                "Time from check-in until placed on a counter",
            )
            .buckets(vec![
                60.0, 300.0, 600.0, 900.0, 1800.0, 3600.0, 7200.0,
            ]),
        )?;
        registry.register(Box::new(queue_wait_seconds.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "walkin_queue_operation_duration_seconds",
                "Queue operation duration",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            visitors_waiting,
            visitors_in_service,
            check_ins_total,
            rejections_total,
            visitors_serviced_total,
            staff_actions_total,
            write_conflicts_total,
            queue_wait_seconds,
            operation_duration,
        })
    }
}

impl EngineMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let ticks_total = IntCounter::new("walkin_queue_ticks_total", "Total ticks executed")?;
        registry.register(Box::new(ticks_total.clone()))?;

        let tick_duration = Histogram::with_opts(
            HistogramOpts::new("walkin_queue_tick_duration_seconds", "Tick duration")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(tick_duration.clone()))?;

        let assignments_total = IntCounterVec::new(
            Opts::new(
                "walkin_queue_assignments_total",
                "Visitors placed on a counter",
            ),
            &["counter"],
        )?;
        registry.register(Box::new(assignments_total.clone()))?;

        let unroutable_visitors = IntGauge::new(
            "walkin_queue_unroutable_visitors",
            "Waiting visitors no configured counter can serve",
        )?;
        registry.register(Box::new(unroutable_visitors.clone()))?;

        let counters_busy =
            IntGauge::new("walkin_queue_counters_busy", "Counters with an occupant")?;
        registry.register(Box::new(counters_busy.clone()))?;

        Ok(Self {
            ticks_total,
            tick_duration,
            assignments_total,
            unroutable_visitors,
            counters_busy,
        })
    }
}

impl EstimatorMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let estimates_total = IntCounterVec::new(
            Opts::new("walkin_queue_estimates_total", "Wait-time estimates produced"),
            &["source"],
        )?;
        registry.register(Box::new(estimates_total.clone()))?;

        let prediction_calls_total = IntCounterVec::new(
            Opts::new(
                "walkin_queue_prediction_calls_total",
                "Prediction collaborator calls",
            ),
            &["status"],
        )?;
        registry.register(Box::new(prediction_calls_total.clone()))?;

        let prediction_duration = Histogram::with_opts(
            HistogramOpts::new(
                "walkin_queue_prediction_duration_seconds",
                "Prediction collaborator latency",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(prediction_duration.clone()))?;

        let last_estimate_minutes = IntGauge::new(
            "walkin_queue_last_estimate_minutes",
            "Most recent wait-time estimate in minutes",
        )?;
        registry.register(Box::new(last_estimate_minutes.clone()))?;

        Ok(Self {
            estimates_total,
            prediction_calls_total,
            prediction_duration,
            last_estimate_minutes,
        })
    }
}
