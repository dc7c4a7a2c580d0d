//! In-memory queue store
//!
//! Keeps the snapshot, its version and the ticket counter behind a single
//! lock so that every read-modify-write is one critical section.

use crate::error::QueueError;
use crate::store::queue_store::{QueueSnapshot, QueueStore, Versioned};
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreState {
    version: u64,
    snapshot: QueueSnapshot,
    ticket_counter: Option<u64>,
}

/// In-memory queue store implementation
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    state: RwLock<StoreState>,
}

impl InMemoryQueueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a snapshot (for restores and tests)
    pub fn with_snapshot(snapshot: QueueSnapshot) -> Self {
        Self {
            state: RwLock::new(StoreState {
                version: 0,
                snapshot,
                ticket_counter: None,
            }),
        }
    }

    /// Current version of the stored snapshot
    pub fn version(&self) -> crate::error::Result<u64> {
        let state = self
            .state
            .read()
            .map_err(|_| QueueError::InternalError {
                message: "Failed to acquire queue store read lock".to_string(),
            })?;
        Ok(state.version)
    }
}

impl QueueStore for InMemoryQueueStore {
    fn load(&self) -> crate::error::Result<Versioned<QueueSnapshot>> {
        let state = self
            .state
            .read()
            .map_err(|_| QueueError::InternalError {
                message: "Failed to acquire queue store read lock".to_string(),
            })?;

        Ok(Versioned {
            version: state.version,
            value: state.snapshot.clone(),
        })
    }

    fn compare_and_swap(
        &self,
        expected_version: u64,
        snapshot: QueueSnapshot,
    ) -> crate::error::Result<bool> {
        let mut state = self
            .state
            .write()
            .map_err(|_| QueueError::InternalError {
                message: "Failed to acquire queue store write lock".to_string(),
            })?;

        if state.version != expected_version {
            debug!(
                "Rejected stale write: expected version {}, store at {}",
                expected_version, state.version
            );
            return Ok(false);
        }

        state.snapshot = snapshot;
        state.version += 1;
        Ok(true)
    }

    fn next_ticket_sequence(&self, initial: u64) -> crate::error::Result<u64> {
        let mut state = self
            .state
            .write()
            .map_err(|_| QueueError::InternalError {
                message: "Failed to acquire ticket counter lock".to_string(),
            })?;

        let issued = state.ticket_counter.unwrap_or(initial);
        state.ticket_counter = Some(issued + 1);
        Ok(issued)
    }

    fn peek_ticket_sequence(&self) -> crate::error::Result<Option<u64>> {
        let state = self
            .state
            .read()
            .map_err(|_| QueueError::InternalError {
                message: "Failed to acquire ticket counter lock".to_string(),
            })?;
        Ok(state.ticket_counter)
    }
}
