//! Service layer for the walk-in queue service
//!
//! This module contains the main application state, service coordination,
//! background task management and the front-door HTTP routes for the
//! production service.

pub mod api;
pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus, ServiceProbe};
