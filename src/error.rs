//! Error types for the queue service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. Callers that need to react to a specific failure
//! (a full queue, an unknown ticket) downcast to [`QueueError`].

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific queue scenarios
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue is full: {max_waiting} visitors already waiting")]
    QueueFull { max_waiting: usize },

    #[error("Ticket not found: {ticket}")]
    UnknownTicket { ticket: String },

    #[error("Cannot {action} ticket {ticket} while it is {status}")]
    InvalidTransition {
        ticket: String,
        status: String,
        action: String,
    },

    #[error("Invalid service request: {reason}")]
    InvalidServiceRequest { reason: String },

    #[error("Counter not configured: {counter}")]
    UnknownCounter { counter: String },

    #[error("Counter unavailable: {counter}")]
    CounterUnavailable { counter: String },

    #[error("Queue write conflict after {attempts} attempts")]
    WriteConflict { attempts: u32 },

    #[error("Prediction unavailable: {reason}")]
    PredictionUnavailable { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl QueueError {
    /// Short machine-readable label, used for metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            QueueError::QueueFull { .. } => "queue_full",
            QueueError::UnknownTicket { .. } => "unknown_ticket",
            QueueError::InvalidTransition { .. } => "invalid_transition",
            QueueError::InvalidServiceRequest { .. } => "invalid_service_request",
            QueueError::UnknownCounter { .. } => "unknown_counter",
            QueueError::CounterUnavailable { .. } => "counter_unavailable",
            QueueError::WriteConflict { .. } => "write_conflict",
            QueueError::PredictionUnavailable { .. } => "prediction_unavailable",
            QueueError::ConfigurationError { .. } => "configuration",
            QueueError::InternalError { .. } => "internal",
        }
    }
}
