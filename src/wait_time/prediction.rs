//! Predictive wait-time collaborator
//!
//! The collaborator receives four text-serialized records describing the
//! current situation and answers with a predicted wait in minutes plus a
//! free-text explanation. It may fail or time out at any point; the
//! estimator owns the fallback.

use crate::error::{QueueError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Payload sent to the collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    /// Recent throughput and per-class handling averages
    pub historical_data: String,
    /// Queue length and status breakdown
    pub current_queue_status: String,
    /// Number of active staff
    pub staff_availability: String,
    /// Service classes requested by waiting visitors
    pub service_types_requested: String,
}

/// Collaborator answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    /// Predicted wait in minutes
    pub predicted_wait_time: f64,
    pub reasoning: String,
}

/// Trait for wait-time prediction backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PredictionCollaborator: Send + Sync {
    /// Ask for a wait-time prediction
    async fn predict(&self, request: PredictionRequest) -> Result<PredictionResponse>;
}

/// JSON-over-HTTP collaborator client
pub struct HttpPredictionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPredictionClient {
    /// Create a client posting to `endpoint`, bounding each call by `timeout`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::ConfigurationError {
                message: format!("Failed to build prediction HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PredictionCollaborator for HttpPredictionClient {
    async fn predict(&self, request: PredictionRequest) -> Result<PredictionResponse> {
        debug!("Requesting wait-time prediction from {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| QueueError::PredictionUnavailable {
                reason: format!("request failed: {}", e),
            })?
            .error_for_status()
            .map_err(|e| QueueError::PredictionUnavailable {
                reason: format!("collaborator returned an error status: {}", e),
            })?;

        let prediction = response
            .json::<PredictionResponse>()
            .await
            .map_err(|e| QueueError::PredictionUnavailable {
                reason: format!("malformed prediction payload: {}", e),
            })?;

        Ok(prediction)
    }
}

/// Collaborator used when no prediction endpoint is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailablePredictionClient;

#[async_trait]
impl PredictionCollaborator for UnavailablePredictionClient {
    async fn predict(&self, _request: PredictionRequest) -> Result<PredictionResponse> {
        Err(QueueError::PredictionUnavailable {
            reason: "no prediction endpoint configured".to_string(),
        }
        .into())
    }
}
