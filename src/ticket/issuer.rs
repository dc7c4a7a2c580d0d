//! Ticket issuer backed by the persisted counter in the queue store

use crate::error::Result;
use crate::store::QueueStore;
use crate::types::TicketNumber;
use std::sync::Arc;
use tracing::debug;

/// First ticket handed out by the staff-facing check-in surface
pub const DEFAULT_INITIAL_TICKET: u64 = 1;

/// First ticket handed out by the self-service kiosk
pub const KIOSK_INITIAL_TICKET: u64 = 111;

/// Allocates unique, monotonically increasing ticket numbers
///
/// The read-modify-write on the counter is delegated to the store, which
/// performs it in a single critical section; any number of issuers sharing a
/// store never hand out the same ticket twice.
#[derive(Clone)]
pub struct TicketIssuer {
    store: Arc<dyn QueueStore>,
    initial: u64,
}

impl TicketIssuer {
    pub fn new(store: Arc<dyn QueueStore>, initial: u64) -> Self {
        Self { store, initial }
    }

    /// Issue the next ticket
    pub fn issue(&self) -> Result<TicketNumber> {
        let sequence = self.store.next_ticket_sequence(self.initial)?;
        let ticket = TicketNumber::new(sequence);
        debug!("Issued ticket {}", ticket);
        Ok(ticket)
    }

    /// Seed value used when the store has no counter yet
    pub fn initial(&self) -> u64 {
        self.initial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryQueueStore;

    #[test]
    fn test_default_seed() {
        let issuer = TicketIssuer::new(Arc::new(InMemoryQueueStore::new()), DEFAULT_INITIAL_TICKET);
        assert_eq!(issuer.issue().unwrap().to_string(), "A-001");
        assert_eq!(issuer.issue().unwrap().to_string(), "A-002");
    }

    #[test]
    fn test_kiosk_seed() {
        let issuer = TicketIssuer::new(Arc::new(InMemoryQueueStore::new()), KIOSK_INITIAL_TICKET);
        assert_eq!(issuer.issue().unwrap().to_string(), "A-111");
    }

    #[test]
    fn test_issuers_sharing_a_store_never_collide() {
        let store: Arc<dyn QueueStore> = Arc::new(InMemoryQueueStore::new());
        let staff_desk = TicketIssuer::new(store.clone(), DEFAULT_INITIAL_TICKET);
        let kiosk = TicketIssuer::new(store, KIOSK_INITIAL_TICKET);

        let a = staff_desk.issue().unwrap();
        let b = kiosk.issue().unwrap();
        let c = staff_desk.issue().unwrap();

        // The first caller seeds the shared counter; the rest continue from it
        assert_eq!(a.sequence(), 1);
        assert_eq!(b.sequence(), 2);
        assert_eq!(c.sequence(), 3);
    }

    #[test]
    fn test_strictly_increasing_past_three_digits() {
        let issuer = TicketIssuer::new(Arc::new(InMemoryQueueStore::new()), 998);
        let tickets: Vec<_> = (0..4).map(|_| issuer.issue().unwrap()).collect();
        assert!(tickets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(tickets[3].to_string(), "A-1001");
    }
}
