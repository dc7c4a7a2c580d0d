//! Walk-in queue - ticketing, counter assignment and wait estimates
//!
//! This crate issues tickets to walk-in visitors, routes them to counters
//! that offer the services they asked for, and estimates how long the next
//! visitor will wait.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod store;
pub mod ticket;
pub mod types;
pub mod utils;
pub mod wait_time;

// Re-export commonly used types and traits
pub use error::{QueueError, Result};
pub use types::*;

// Re-export key components
pub use engine::{AssignmentEngine, CounterRoster, TickOutcome, TickScheduler};
pub use events::EventPublisher;
pub use queue::QueueManager;
pub use store::{InMemoryQueueStore, QueueStore};
pub use ticket::TicketIssuer;
pub use wait_time::{WaitTimeEstimate, WaitTimeEstimator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
