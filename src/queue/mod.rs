//! Queue management
//!
//! The queue manager owns every mutation of the persisted queue: check-ins,
//! service updates, staff actions and scheduled ticks.

pub mod manager;

pub use manager::{QueueManager, QueueManagerStats, QueueSettings, DEFAULT_MAX_SERVICE_MINUTES};
