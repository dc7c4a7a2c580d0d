//! Utility functions for the queue service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique queue entry ID
pub fn generate_entry_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Whether `instant` falls on the same UTC calendar day as `now`
pub fn is_same_day(instant: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    instant.date_naive() == now.date_naive()
}
