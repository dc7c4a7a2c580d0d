//! Queue store interface
//!
//! This module defines the contract of the durable key-value holder behind
//! the queue: the waiting/in-service list, the serviced history and the
//! persisted ticket counter.

use crate::types::{EntryStatus, QueueEntry, TicketNumber};
use serde::{Deserialize, Serialize};

/// Both persisted collections, read and written together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Waiting and in-service entries
    pub queue: Vec<QueueEntry>,
    /// Archived serviced entries, oldest first
    pub serviced: Vec<QueueEntry>,
}

impl QueueSnapshot {
    /// Number of entries currently waiting
    pub fn waiting_count(&self) -> usize {
        self.count_with_status(EntryStatus::Waiting)
    }

    /// Number of entries currently being served
    pub fn in_service_count(&self) -> usize {
        self.count_with_status(EntryStatus::InService)
    }

    fn count_with_status(&self, status: EntryStatus) -> usize {
        self.queue.iter().filter(|e| e.status == status).count()
    }

    /// Look a ticket up in the active queue first, then in the history
    pub fn find(&self, ticket: TicketNumber) -> Option<&QueueEntry> {
        self.queue
            .iter()
            .chain(self.serviced.iter())
            .find(|e| e.ticket_number == ticket)
    }

    /// Mutable lookup restricted to the active queue
    pub fn find_active_mut(&mut self, ticket: TicketNumber) -> Option<&mut QueueEntry> {
        self.queue.iter_mut().find(|e| e.ticket_number == ticket)
    }

    /// Mutable lookup restricted to the serviced history
    pub fn find_serviced_mut(&mut self, ticket: TicketNumber) -> Option<&mut QueueEntry> {
        self.serviced.iter_mut().find(|e| e.ticket_number == ticket)
    }
}

/// A value read from the store together with the version it was read at
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Trait for queue store operations
pub trait QueueStore: Send + Sync {
    /// Read the current snapshot and its version
    fn load(&self) -> crate::error::Result<Versioned<QueueSnapshot>>;

    /// Replace the snapshot if the store is still at `expected_version`
    ///
    /// Returns `Ok(false)` when another writer got there first; the caller
    /// should reload and retry.
    fn compare_and_swap(
        &self,
        expected_version: u64,
        snapshot: QueueSnapshot,
    ) -> crate::error::Result<bool>;

    /// Atomically hand out the next ticket sequence and advance the counter
    ///
    /// `initial` seeds the counter the first time it is used.
    fn next_ticket_sequence(&self, initial: u64) -> crate::error::Result<u64>;

    /// Peek at the next sequence that would be issued, if seeded
    fn peek_ticket_sequence(&self) -> crate::error::Result<Option<u64>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceRequest;
    use crate::utils::current_timestamp;

    fn entry(seq: u64, status: EntryStatus) -> QueueEntry {
        let mut entry = QueueEntry::new(
            TicketNumber::new(seq),
            format!("Visitor {}", seq),
            "555-0100",
            vec![ServiceRequest::new("Consult", "x", 10)],
            current_timestamp(),
        );
        entry.status = status;
        entry
    }

    #[test]
    fn test_snapshot_counts() {
        let snapshot = QueueSnapshot {
            queue: vec![
                entry(1, EntryStatus::InService),
                entry(2, EntryStatus::Waiting),
                entry(3, EntryStatus::Waiting),
            ],
            serviced: vec![entry(0, EntryStatus::Serviced)],
        };

        assert_eq!(snapshot.waiting_count(), 2);
        assert_eq!(snapshot.in_service_count(), 1);
    }

    #[test]
    fn test_snapshot_find_searches_history() {
        let mut snapshot = QueueSnapshot {
            queue: vec![entry(2, EntryStatus::Waiting)],
            serviced: vec![entry(1, EntryStatus::Serviced)],
        };

        assert!(snapshot.find(TicketNumber::new(1)).is_some());
        assert!(snapshot.find(TicketNumber::new(2)).is_some());
        assert!(snapshot.find(TicketNumber::new(3)).is_none());
        assert!(snapshot.find_active_mut(TicketNumber::new(1)).is_none());
        assert!(snapshot.find_serviced_mut(TicketNumber::new(1)).is_some());
    }
}
