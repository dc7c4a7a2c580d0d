//! Outbound queue events
//!
//! Observers (display boards, staff consoles) learn about check-ins, tick
//! deltas and staff actions through an [`EventPublisher`].

use crate::error::Result;
use crate::types::{QueueEvent, StaffAction, TickCompleted, VisitorCheckedIn};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of events a slow subscriber may lag behind
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Trait for publishing queue events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a VisitorCheckedIn event
    async fn publish_visitor_checked_in(&self, event: VisitorCheckedIn) -> Result<()>;

    /// Publish the delta produced by one tick
    async fn publish_tick_completed(&self, event: TickCompleted) -> Result<()>;

    /// Publish a manual staff intervention
    async fn publish_staff_action(&self, event: StaffAction) -> Result<()>;
}

/// In-process publisher fanning events out over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<QueueEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn send(&self, event: QueueEvent) -> Result<()> {
        // Nobody listening is not a failure
        if self.sender.send(event).is_err() {
            debug!("No subscribers for queue event, dropping it");
        }
        Ok(())
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish_visitor_checked_in(&self, event: VisitorCheckedIn) -> Result<()> {
        debug!("Publishing check-in for ticket {}", event.entry.ticket_number);
        self.send(QueueEvent::VisitorCheckedIn(event))
    }

    async fn publish_tick_completed(&self, event: TickCompleted) -> Result<()> {
        debug!(
            "Publishing tick delta: {} serviced, {} assigned",
            event.newly_serviced.len(),
            event.assignments.len()
        );
        self.send(QueueEvent::TickCompleted(event))
    }

    async fn publish_staff_action(&self, event: StaffAction) -> Result<()> {
        debug!("Publishing staff action on ticket {}", event.ticket_number);
        self.send(QueueEvent::StaffAction(event))
    }
}

/// Publisher that discards everything, for tools that do not need events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish_visitor_checked_in(&self, _event: VisitorCheckedIn) -> Result<()> {
        Ok(())
    }

    async fn publish_tick_completed(&self, _event: TickCompleted) -> Result<()> {
        Ok(())
    }

    async fn publish_staff_action(&self, _event: StaffAction) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QueueEntry, TicketNumber};
    use crate::utils::current_timestamp;

    fn checked_in(seq: u64) -> VisitorCheckedIn {
        VisitorCheckedIn {
            entry: QueueEntry::new(
                TicketNumber::new(seq),
                "Visitor",
                "555-0100",
                vec![],
                current_timestamp(),
            ),
            waiting_count: 1,
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let publisher = BroadcastEventPublisher::default();
        let mut rx = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher
            .publish_visitor_checked_in(checked_in(4))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            QueueEvent::VisitorCheckedIn(event) => {
                assert_eq!(event.entry.ticket_number, TicketNumber::new(4));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let publisher = BroadcastEventPublisher::new(4);
        assert!(publisher
            .publish_tick_completed(TickCompleted {
                now: current_timestamp(),
                newly_serviced: vec![],
                assignments: vec![],
                unroutable: vec![],
                queue: vec![],
            })
            .await
            .is_ok());
    }
}
