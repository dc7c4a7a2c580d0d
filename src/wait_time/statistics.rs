//! Statistical tracking for queue waits and handling times
//!
//! Samples are kept per service class so that the prediction collaborator can
//! be given historical averages for the services currently being requested.

use crate::error::QueueError;
use crate::types::ServiceClass;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Running statistics for one sample category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationStats {
    /// Number of samples collected
    pub sample_count: u64,
    /// Sum of all samples (for calculating mean)
    pub sum_seconds: f64,
    /// Last update timestamp
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl DurationStats {
    /// Create new empty statistics
    pub fn new() -> Self {
        Self {
            sample_count: 0,
            sum_seconds: 0.0,
            last_updated: chrono::Utc::now(),
        }
    }

    /// Add a new sample
    pub fn add_sample(&mut self, sample: Duration) {
        self.sample_count += 1;
        self.sum_seconds += sample.as_secs_f64();
        self.last_updated = chrono::Utc::now();
    }

    /// Calculate the mean
    pub fn mean(&self) -> Duration {
        if self.sample_count == 0 {
            return Duration::from_secs(0);
        }

        Duration::from_secs_f64(self.sum_seconds / self.sample_count as f64)
    }

    /// Mean expressed in (fractional) minutes
    pub fn mean_minutes(&self) -> f64 {
        self.mean().as_secs_f64() / 60.0
    }
}

impl Default for DurationStats {
    fn default() -> Self {
        Self::new()
    }
}

/// What a sample measures
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    /// Check-in until placed on a counter
    QueueWait,
    /// Placed on a counter until serviced
    Handling,
}

/// Key for identifying different sample categories
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsKey {
    pub kind: SampleKind,
    pub service_class: ServiceClass,
}

impl StatsKey {
    pub fn new(kind: SampleKind, service_class: impl Into<ServiceClass>) -> Self {
        Self {
            kind,
            service_class: service_class.into(),
        }
    }

    pub fn handling(service_class: impl Into<ServiceClass>) -> Self {
        Self::new(SampleKind::Handling, service_class)
    }

    pub fn queue_wait(service_class: impl Into<ServiceClass>) -> Self {
        Self::new(SampleKind::QueueWait, service_class)
    }
}

/// Trait for tracking duration statistics
pub trait StatisticsTracker: Send + Sync {
    /// Record a sample
    fn record(&self, key: StatsKey, sample: Duration) -> crate::error::Result<()>;

    /// Get all tracked statistics
    fn get_all_stats(&self) -> crate::error::Result<HashMap<StatsKey, DurationStats>>;

    /// Mean minutes of one sample kind for every class with samples
    fn averages(&self, kind: SampleKind) -> crate::error::Result<HashMap<ServiceClass, f64>> {
        Ok(self
            .get_all_stats()?
            .into_iter()
            .filter(|(key, stats)| key.kind == kind && stats.sample_count > 0)
            .map(|(key, stats)| (key.service_class, stats.mean_minutes()))
            .collect())
    }
}

/// In-memory statistics tracker
#[derive(Debug)]
pub struct InMemoryStatisticsTracker {
    stats: std::sync::RwLock<HashMap<StatsKey, DurationStats>>,
    max_entries: usize,
}

impl InMemoryStatisticsTracker {
    /// Create a new in-memory statistics tracker
    pub fn new(max_entries: usize) -> Self {
        Self {
            stats: std::sync::RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    /// Drop the least recently updated categories once over the limit
    fn cleanup_if_needed(&self) -> crate::error::Result<()> {
        let mut stats = self.stats.write().map_err(|_| QueueError::InternalError {
            message: "Failed to acquire statistics write lock".to_string(),
        })?;

        if stats.len() > self.max_entries {
            let mut entries: Vec<_> = stats
                .iter()
                .map(|(k, v)| (k.clone(), v.last_updated))
                .collect();
            entries.sort_by(|a, b| a.1.cmp(&b.1));

            let to_remove = stats.len() - self.max_entries;
            for (key, _) in entries.into_iter().take(to_remove) {
                stats.remove(&key);
            }
        }

        Ok(())
    }
}

impl Default for InMemoryStatisticsTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl StatisticsTracker for InMemoryStatisticsTracker {
    fn record(&self, key: StatsKey, sample: Duration) -> crate::error::Result<()> {
        let mut stats = self.stats.write().map_err(|_| QueueError::InternalError {
            message: "Failed to acquire statistics write lock".to_string(),
        })?;

        stats.entry(key).or_default().add_sample(sample);

        drop(stats); // Release lock before cleanup
        self.cleanup_if_needed()
    }

    fn get_all_stats(&self) -> crate::error::Result<HashMap<StatsKey, DurationStats>> {
        let stats = self.stats.read().map_err(|_| QueueError::InternalError {
            message: "Failed to acquire statistics read lock".to_string(),
        })?;

        Ok(stats.clone())
    }
}
