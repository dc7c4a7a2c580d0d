//! Wait time estimation
//!
//! This module handles handling-time statistics, the external prediction
//! collaborator and the estimator that combines them with a deterministic
//! fallback.

pub mod estimator;
pub mod jitter;
pub mod prediction;
pub mod statistics;

// Re-export commonly used types
pub use estimator::{
    fallback_minutes, EstimateSource, EstimatorConfig, PredictionContext, WaitTimeEstimate,
    WaitTimeEstimator,
};
pub use jitter::{FixedJitter, JitterSource, NoJitter, RandomJitter};
pub use prediction::{
    HttpPredictionClient, PredictionCollaborator, PredictionRequest, PredictionResponse,
    UnavailablePredictionClient,
};
pub use statistics::{InMemoryStatisticsTracker, SampleKind, StatisticsTracker, StatsKey};
