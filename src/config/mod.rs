//! Configuration management for the walk-in queue service
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values.

pub mod app;
pub mod counters;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, EstimatorSettings, QueueConfig, ServiceSettings,
};
pub use counters::{default_counters, CounterSettings};
