//! Queue state persistence
//!
//! The store holds the active queue, the serviced history and the ticket
//! counter. It offers versioned compare-and-swap writes; serializing writers
//! is the responsibility of the queue manager.

pub mod memory;
pub mod queue_store;

pub use memory::InMemoryQueueStore;
pub use queue_store::{QueueSnapshot, QueueStore, Versioned};
