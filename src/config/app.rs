//! Main application configuration
//!
//! This module defines the primary configuration structures for the walk-in
//! queue service, including file and environment variable loading and
//! validation.

use crate::config::counters::{default_counters, CounterSettings};
use crate::engine::CounterRoster;
use crate::queue::{QueueSettings, DEFAULT_MAX_SERVICE_MINUTES};
use crate::ticket::DEFAULT_INITIAL_TICKET;
use crate::wait_time::EstimatorConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub queue: QueueConfig,
    pub estimator: EstimatorSettings,
    /// Counters in canonical fill order
    pub counters: Vec<CounterSettings>,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the metrics and health endpoints
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Queue behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Check-ins are rejected once this many visitors are waiting
    pub max_waiting: usize,
    /// First ticket number when the store has no counter yet
    pub initial_ticket_number: u64,
    /// Seconds between assignment ticks
    pub tick_interval_seconds: u64,
    /// Compare-and-swap attempts per write
    pub max_write_retries: u32,
    /// Longest accepted duration for one requested service
    pub max_service_minutes: u32,
}

/// Wait-time estimator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    /// Minutes per waiting visitor in the fallback calculation
    pub base_service_minutes: u32,
    /// Smallest estimate shown for a collaborator prediction
    pub min_display_minutes: u32,
    /// Prediction collaborator endpoint; the fallback is always used without one
    pub prediction_url: Option<String>,
    /// Upper bound on a collaborator call in milliseconds
    pub prediction_timeout_ms: u64,
    /// Randomize collaborator predictions slightly for display
    pub enable_jitter: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "walkin-queue".to_string(),
            log_level: "info".to_string(),
            metrics_port: 9090,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_waiting: 20,
            initial_ticket_number: DEFAULT_INITIAL_TICKET,
            tick_interval_seconds: 5,
            max_write_retries: 5,
            max_service_minutes: DEFAULT_MAX_SERVICE_MINUTES,
        }
    }
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        let estimator = EstimatorConfig::default();
        Self {
            base_service_minutes: estimator.base_service_minutes_per_person,
            min_display_minutes: estimator.min_display_minutes,
            prediction_url: None,
            prediction_timeout_ms: estimator.prediction_timeout_ms,
            enable_jitter: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still win
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse a TOML document without validating it
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| anyhow!("Invalid configuration: {}", e))
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("METRICS_PORT") {
            self.service.metrics_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid METRICS_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Queue settings
        if let Ok(max) = env::var("MAX_WAITING") {
            self.queue.max_waiting = max
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_WAITING value: {}", max))?;
        }
        if let Ok(initial) = env::var("INITIAL_TICKET_NUMBER") {
            self.queue.initial_ticket_number = initial
                .parse()
                .map_err(|_| anyhow!("Invalid INITIAL_TICKET_NUMBER value: {}", initial))?;
        }
        if let Ok(interval) = env::var("TICK_INTERVAL_SECONDS") {
            self.queue.tick_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid TICK_INTERVAL_SECONDS value: {}", interval))?;
        }
        if let Ok(retries) = env::var("MAX_WRITE_RETRIES") {
            self.queue.max_write_retries = retries
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_WRITE_RETRIES value: {}", retries))?;
        }
        if let Ok(max) = env::var("MAX_SERVICE_MINUTES") {
            self.queue.max_service_minutes = max
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_SERVICE_MINUTES value: {}", max))?;
        }

        // Estimator settings
        if let Ok(base) = env::var("BASE_SERVICE_MINUTES") {
            self.estimator.base_service_minutes = base
                .parse()
                .map_err(|_| anyhow!("Invalid BASE_SERVICE_MINUTES value: {}", base))?;
        }
        if let Ok(min) = env::var("MIN_DISPLAY_MINUTES") {
            self.estimator.min_display_minutes = min
                .parse()
                .map_err(|_| anyhow!("Invalid MIN_DISPLAY_MINUTES value: {}", min))?;
        }
        if let Ok(url) = env::var("PREDICTION_URL") {
            self.estimator.prediction_url = if url.trim().is_empty() { None } else { Some(url) };
        }
        if let Ok(timeout) = env::var("PREDICTION_TIMEOUT_MS") {
            self.estimator.prediction_timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid PREDICTION_TIMEOUT_MS value: {}", timeout))?;
        }
        if let Ok(jitter) = env::var("ENABLE_ESTIMATE_JITTER") {
            self.estimator.enable_jitter = jitter
                .parse()
                .map_err(|_| anyhow!("Invalid ENABLE_ESTIMATE_JITTER value: {}", jitter))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.queue.tick_interval_seconds)
    }

    /// Configured counters, or the built-in defaults when none are listed
    pub fn counter_roster(&self) -> crate::error::Result<CounterRoster> {
        let counters = if self.counters.is_empty() {
            default_counters()
        } else {
            self.counters.clone()
        };
        CounterRoster::new(counters.into_iter().map(Into::into).collect())
    }

    /// Settings handed to the queue manager
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            max_waiting: self.queue.max_waiting,
            max_write_retries: self.queue.max_write_retries,
            initial_ticket_number: self.queue.initial_ticket_number,
            max_service_minutes: self.queue.max_service_minutes,
        }
    }

    /// Settings handed to the wait-time estimator
    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            base_service_minutes_per_person: self.estimator.base_service_minutes,
            min_display_minutes: self.estimator.min_display_minutes,
            prediction_timeout_ms: self.estimator.prediction_timeout_ms,
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.metrics_port == 0 {
        return Err(anyhow!("Metrics port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.queue.tick_interval_seconds == 0 {
        return Err(anyhow!("Tick interval must be greater than 0"));
    }

    // Validate queue settings
    if config.queue.max_waiting == 0 {
        return Err(anyhow!("Max waiting must be greater than 0"));
    }
    if config.queue.max_write_retries == 0 {
        return Err(anyhow!("Max write retries must be greater than 0"));
    }
    if config.queue.max_service_minutes == 0 {
        return Err(anyhow!("Max service minutes must be greater than 0"));
    }

    // Validate estimator settings
    config.estimator_config().validate()?;
    if let Some(url) = &config.estimator.prediction_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!("Prediction URL must be http(s): {}", url));
        }
    }

    // Validate counters
    let mut names = HashSet::new();
    for counter in &config.counters {
        if !names.insert(counter.name.as_str()) {
            return Err(anyhow!("Duplicate counter name: {}", counter.name));
        }
    }
    config.counter_roster()?;

    Ok(())
}
