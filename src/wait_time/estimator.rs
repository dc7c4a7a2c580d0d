//! Wait-time estimation
//!
//! The estimator asks the prediction collaborator first. Whenever that fails,
//! times out or answers with something that is not a usable number of
//! minutes, it falls back to a deterministic per-head calculation. Either way
//! a caller always gets an estimate back.

use crate::error::QueueError;
use crate::metrics::MetricsCollector;
use crate::types::ServiceClass;
use crate::wait_time::jitter::{JitterSource, NoJitter, RandomJitter};
use crate::wait_time::prediction::{
    PredictionCollaborator, PredictionRequest, UnavailablePredictionClient,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for wait time estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Minutes of work assumed per waiting visitor in the fallback
    pub base_service_minutes_per_person: u32,
    /// Smallest estimate shown for a collaborator prediction
    pub min_display_minutes: u32,
    /// Upper bound on a single collaborator call
    pub prediction_timeout_ms: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            base_service_minutes_per_person: 5,
            min_display_minutes: 5,
            prediction_timeout_ms: 3000,
        }
    }
}

impl EstimatorConfig {
    /// Validate configuration values
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.base_service_minutes_per_person == 0 {
            return Err(QueueError::ConfigurationError {
                message: "base_service_minutes_per_person must be greater than 0".to_string(),
            }
            .into());
        }

        if self.prediction_timeout_ms == 0 {
            return Err(QueueError::ConfigurationError {
                message: "prediction_timeout_ms must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub fn prediction_timeout(&self) -> Duration {
        Duration::from_millis(self.prediction_timeout_ms)
    }
}

/// Where an estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Prediction,
    Fallback,
}

impl EstimateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateSource::Prediction => "prediction",
            EstimateSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for EstimateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated wait shown to a visitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitTimeEstimate {
    pub minutes: u32,
    pub reasoning: String,
    pub source: EstimateSource,
}

/// Everything known about the current situation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionContext {
    pub queue_length: usize,
    pub active_staff: usize,
    pub serviced_today: usize,
    /// Waiting visitors per requested service class
    pub service_mix: BTreeMap<ServiceClass, usize>,
    /// Historical mean handling minutes per service class
    pub handling_averages: BTreeMap<ServiceClass, f64>,
    /// Historical mean minutes from check-in to a counter, per service class
    pub queue_wait_averages: BTreeMap<ServiceClass, f64>,
}

impl PredictionContext {
    pub fn new(queue_length: usize, active_staff: usize, serviced_today: usize) -> Self {
        Self {
            queue_length,
            active_staff,
            serviced_today,
            ..Default::default()
        }
    }

    fn to_request(&self) -> PredictionRequest {
        PredictionRequest {
            historical_data: json!({
                "servicedToday": self.serviced_today,
                "averageHandlingMinutes": self.handling_averages,
                "averageQueueWaitMinutes": self.queue_wait_averages,
            })
            .to_string(),
            current_queue_status: json!({
                "queueLength": self.queue_length,
                "waitingByService": self.service_mix,
            })
            .to_string(),
            staff_availability: json!({ "activeStaff": self.active_staff }).to_string(),
            service_types_requested: json!(self.service_mix.keys().collect::<Vec<_>>())
                .to_string(),
        }
    }
}

/// Deterministic per-head estimate: `round(queue_length * base / staff)`
///
/// An empty queue waits zero minutes. Zero staff counts as one.
pub fn fallback_minutes(queue_length: usize, active_staff: usize, base_minutes: u32) -> u32 {
    if queue_length == 0 {
        return 0;
    }

    let staff = active_staff.max(1) as f64;
    let minutes = (queue_length as f64 * f64::from(base_minutes) / staff).round();
    minutes.min(f64::from(u32::MAX)) as u32
}

/// Produces wait-time estimates, never failing
pub struct WaitTimeEstimator {
    config: EstimatorConfig,
    collaborator: Arc<dyn PredictionCollaborator>,
    jitter: Arc<dyn JitterSource>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl WaitTimeEstimator {
    /// Create an estimator with random display jitter
    pub fn new(
        config: EstimatorConfig,
        collaborator: Arc<dyn PredictionCollaborator>,
    ) -> crate::error::Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            collaborator,
            jitter: Arc::new(RandomJitter::new()),
            metrics: None,
        })
    }

    /// Estimator that never calls out and always uses the fallback
    pub fn fallback_only(config: EstimatorConfig) -> crate::error::Result<Self> {
        Ok(Self::new(config, Arc::new(UnavailablePredictionClient))?.with_jitter(Arc::new(NoJitter)))
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimate from the three headline numbers
    pub async fn estimate(
        &self,
        queue_length: usize,
        active_staff: usize,
        serviced_today: usize,
    ) -> WaitTimeEstimate {
        self.estimate_with_context(PredictionContext::new(
            queue_length,
            active_staff,
            serviced_today,
        ))
        .await
    }

    /// Estimate with service mix and handling history passed to the collaborator
    pub async fn estimate_with_context(&self, context: PredictionContext) -> WaitTimeEstimate {
        let estimate = match self.ask_collaborator(&context).await {
            Ok(predicted) => self.from_prediction(predicted.0, predicted.1),
            Err(reason) => {
                warn!("Wait-time prediction unavailable, using fallback: {}", reason);
                self.fallback_estimate(context.queue_length, context.active_staff)
            }
        };

        debug!(
            "Estimated {} minutes for {} waiting with {} staff ({})",
            estimate.minutes, context.queue_length, context.active_staff, estimate.source
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_estimate(estimate.source.as_str(), estimate.minutes);
        }

        estimate
    }

    /// Deterministic estimate used whenever the collaborator cannot answer
    pub fn fallback_estimate(&self, queue_length: usize, active_staff: usize) -> WaitTimeEstimate {
        let base = self.config.base_service_minutes_per_person;
        let minutes = fallback_minutes(queue_length, active_staff, base);

        WaitTimeEstimate {
            minutes,
            reasoning: format!(
                "Simplified calculation: {} waiting x {} min / {} staff",
                queue_length,
                base,
                active_staff.max(1)
            ),
            source: EstimateSource::Fallback,
        }
    }

    /// Call the collaborator under the timeout and validate its answer
    async fn ask_collaborator(
        &self,
        context: &PredictionContext,
    ) -> std::result::Result<(f64, String), String> {
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.config.prediction_timeout(),
            self.collaborator.predict(context.to_request()),
        )
        .await;

        let result = match outcome {
            Err(_) => Err(format!(
                "timed out after {}ms",
                self.config.prediction_timeout_ms
            )),
            Ok(Err(e)) => Err(e.to_string()),
            Ok(Ok(response)) => {
                let predicted = response.predicted_wait_time;
                if predicted.is_finite() && predicted >= 0.0 {
                    Ok((predicted, response.reasoning))
                } else {
                    Err(format!("unusable prediction value {}", predicted))
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_prediction_call(result.is_ok(), started.elapsed());
        }

        result
    }

    fn from_prediction(&self, predicted: f64, reasoning: String) -> WaitTimeEstimate {
        let rounded = predicted.round().min(f64::from(u32::MAX)) as i64;
        let jittered = rounded + self.jitter.offset_minutes();
        let minutes = jittered.max(i64::from(self.config.min_display_minutes));

        WaitTimeEstimate {
            minutes: u32::try_from(minutes).unwrap_or(u32::MAX),
            reasoning,
            source: EstimateSource::Prediction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait_time::jitter::FixedJitter;
    use crate::wait_time::prediction::{MockPredictionCollaborator, PredictionResponse};

    fn estimator_with(mock: MockPredictionCollaborator, jitter: i64) -> WaitTimeEstimator {
        WaitTimeEstimator::new(EstimatorConfig::default(), Arc::new(mock))
            .unwrap()
            .with_jitter(Arc::new(FixedJitter(jitter)))
    }

    fn answering(predicted: f64) -> MockPredictionCollaborator {
        let mut mock = MockPredictionCollaborator::new();
        mock.expect_predict().returning(move |_| {
            Ok(PredictionResponse {
                predicted_wait_time: predicted,
                reasoning: "Two consultations ahead".to_string(),
            })
        });
        mock
    }

    #[test]
    fn test_fallback_formula() {
        assert_eq!(fallback_minutes(10, 2, 5), 25);
        assert_eq!(fallback_minutes(0, 3, 5), 0);
        assert_eq!(fallback_minutes(3, 0, 5), 15);
        // 7 * 5 / 3 = 11.67
        assert_eq!(fallback_minutes(7, 3, 5), 12);
    }

    #[tokio::test]
    async fn test_fallback_when_collaborator_fails() {
        let mut mock = MockPredictionCollaborator::new();
        mock.expect_predict().times(1).returning(|_| {
            Err(QueueError::PredictionUnavailable {
                reason: "model offline".to_string(),
            }
            .into())
        });

        let estimate = estimator_with(mock, 0).estimate(10, 2, 40).await;
        assert_eq!(estimate.minutes, 25);
        assert_eq!(estimate.source, EstimateSource::Fallback);
        assert!(estimate.reasoning.contains("Simplified calculation"));
    }

    #[tokio::test]
    async fn test_prediction_rounded_and_jittered() {
        let estimate = estimator_with(answering(12.4), 3).estimate(4, 2, 10).await;
        assert_eq!(estimate.minutes, 15);
        assert_eq!(estimate.source, EstimateSource::Prediction);
        assert_eq!(estimate.reasoning, "Two consultations ahead");
    }

    #[tokio::test]
    async fn test_prediction_clamped_to_minimum() {
        let estimate = estimator_with(answering(1.0), -2).estimate(1, 4, 0).await;
        assert_eq!(estimate.minutes, 5);
        assert_eq!(estimate.source, EstimateSource::Prediction);
    }

    #[tokio::test]
    async fn test_unusable_prediction_falls_back() {
        for bad in [f64::NAN, f64::INFINITY, -3.0] {
            let estimate = estimator_with(answering(bad), 0).estimate(10, 2, 0).await;
            assert_eq!(estimate.source, EstimateSource::Fallback);
            assert_eq!(estimate.minutes, 25);
        }
    }

    #[tokio::test]
    async fn test_request_carries_context() {
        let mut mock = MockPredictionCollaborator::new();
        mock.expect_predict()
            .withf(|request| {
                request.current_queue_status.contains("\"queueLength\":3")
                    && request.staff_availability.contains("\"activeStaff\":2")
                    && request.service_types_requested.contains("billing")
                    && request.historical_data.contains("\"servicedToday\":9")
                    && request
                        .historical_data
                        .contains("\"averageQueueWaitMinutes\":{\"billing\":4.5}")
            })
            .returning(|_| {
                Ok(PredictionResponse {
                    predicted_wait_time: 8.0,
                    reasoning: "ok".to_string(),
                })
            });

        let mut context = PredictionContext::new(3, 2, 9);
        context.service_mix.insert("billing".to_string(), 3);
        context.queue_wait_averages.insert("billing".to_string(), 4.5);

        let estimate = estimator_with(mock, 0).estimate_with_context(context).await;
        assert_eq!(estimate.minutes, 8);
    }

    struct SlowCollaborator;

    #[async_trait::async_trait]
    impl PredictionCollaborator for SlowCollaborator {
        async fn predict(
            &self,
            _request: PredictionRequest,
        ) -> crate::error::Result<PredictionResponse> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(PredictionResponse {
                predicted_wait_time: 1.0,
                reasoning: "too late".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let config = EstimatorConfig {
            prediction_timeout_ms: 50,
            ..Default::default()
        };
        let estimator = WaitTimeEstimator::new(config, Arc::new(SlowCollaborator)).unwrap();

        let estimate = estimator.estimate(4, 1, 0).await;
        assert_eq!(estimate.source, EstimateSource::Fallback);
        assert_eq!(estimate.minutes, 20);
    }

    #[test]
    fn test_config_validation() {
        assert!(EstimatorConfig::default().validate().is_ok());
        let bad = EstimatorConfig {
            base_service_minutes_per_person: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
