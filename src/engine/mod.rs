//! Queue assignment and progression engine
//!
//! This module contains the counter roster, the pure tick function that
//! completes and assigns visitors, and the scheduler that drives it.

pub mod assignment;
pub mod roster;
pub mod scheduler;

pub use assignment::{AssignmentEngine, TickOutcome};
pub use roster::{Counter, CounterRoster};
pub use scheduler::{Clock, TickScheduler};
