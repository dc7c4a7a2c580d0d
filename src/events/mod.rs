//! Event publishing for queue observers

pub mod publisher;

pub use publisher::{BroadcastEventPublisher, EventPublisher, NoopEventPublisher};
