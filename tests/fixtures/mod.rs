//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use walkin_queue::engine::{AssignmentEngine, Counter, CounterRoster};
use walkin_queue::error::{QueueError, Result};
use walkin_queue::events::EventPublisher;
use walkin_queue::queue::{QueueManager, QueueSettings};
use walkin_queue::store::{InMemoryQueueStore, QueueSnapshot, QueueStore, Versioned};
use walkin_queue::types::{
    CheckInRequest, QueueEvent, ServiceRequest, StaffAction, TickCompleted, VisitorCheckedIn,
};
use walkin_queue::wait_time::{PredictionCollaborator, PredictionRequest, PredictionResponse};

/// Mock event publisher that captures published events for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: Arc<Mutex<Vec<QueueEvent>>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_published_events(&self) -> Vec<QueueEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events of specific type
    pub fn count_events_of_type(&self, event_type: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| match event {
                QueueEvent::VisitorCheckedIn(_) => event_type == "VisitorCheckedIn",
                QueueEvent::TickCompleted(_) => event_type == "TickCompleted",
                QueueEvent::StaffAction(_) => event_type == "StaffAction",
            })
            .count()
    }

    /// Tick deltas in publish order
    pub fn tick_events(&self) -> Vec<TickCompleted> {
        self.get_published_events()
            .into_iter()
            .filter_map(|event| match event {
                QueueEvent::TickCompleted(tick) => Some(tick),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: QueueEvent) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_visitor_checked_in(&self, event: VisitorCheckedIn) -> Result<()> {
        self.push(QueueEvent::VisitorCheckedIn(event));
        Ok(())
    }

    async fn publish_tick_completed(&self, event: TickCompleted) -> Result<()> {
        self.push(QueueEvent::TickCompleted(event));
        Ok(())
    }

    async fn publish_staff_action(&self, event: StaffAction) -> Result<()> {
        self.push(QueueEvent::StaffAction(event));
        Ok(())
    }
}

/// Collaborator that always predicts the same number of minutes
#[derive(Debug)]
pub struct FixedPredictionClient {
    minutes: f64,
    calls: AtomicUsize,
    last_request: Mutex<Option<PredictionRequest>>,
}

impl FixedPredictionClient {
    pub fn new(minutes: f64) -> Self {
        Self {
            minutes,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<PredictionRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl PredictionCollaborator for FixedPredictionClient {
    async fn predict(&self, request: PredictionRequest) -> Result<PredictionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request);
        }
        Ok(PredictionResponse {
            predicted_wait_time: self.minutes,
            reasoning: "Fixed prediction".to_string(),
        })
    }
}

/// Collaborator that always fails
#[derive(Debug, Default)]
pub struct FailingPredictionClient;

#[async_trait]
impl PredictionCollaborator for FailingPredictionClient {
    async fn predict(&self, _request: PredictionRequest) -> Result<PredictionResponse> {
        Err(QueueError::PredictionUnavailable {
            reason: "collaborator offline".to_string(),
        }
        .into())
    }
}

/// Store whose compare-and-swap always loses, as if another writer raced it
#[derive(Default)]
pub struct ContendedQueueStore {
    inner: InMemoryQueueStore,
    attempts: AtomicUsize,
}

impl ContendedQueueStore {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl QueueStore for ContendedQueueStore {
    fn load(&self) -> Result<Versioned<QueueSnapshot>> {
        self.inner.load()
    }

    fn compare_and_swap(&self, _expected_version: u64, _snapshot: QueueSnapshot) -> Result<bool> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    fn next_ticket_sequence(&self, initial: u64) -> Result<u64> {
        self.inner.next_ticket_sequence(initial)
    }

    fn peek_ticket_sequence(&self) -> Result<Option<u64>> {
        self.inner.peek_ticket_sequence()
    }
}

/// Store where another writer commits `rival` just before the first
/// compare-and-swap, so that write is lost and retried
pub struct RacingQueueStore {
    inner: InMemoryQueueStore,
    rival: Mutex<Option<QueueSnapshot>>,
}

impl RacingQueueStore {
    pub fn new(rival: QueueSnapshot) -> Self {
        Self {
            inner: InMemoryQueueStore::new(),
            rival: Mutex::new(Some(rival)),
        }
    }
}

impl QueueStore for RacingQueueStore {
    fn load(&self) -> Result<Versioned<QueueSnapshot>> {
        self.inner.load()
    }

    fn compare_and_swap(&self, expected_version: u64, snapshot: QueueSnapshot) -> Result<bool> {
        let rival = self.rival.lock().ok().and_then(|mut rival| rival.take());
        if let Some(rival) = rival {
            let current = self.inner.load()?;
            self.inner.compare_and_swap(current.version, rival)?;
        }
        self.inner.compare_and_swap(expected_version, snapshot)
    }

    fn next_ticket_sequence(&self, initial: u64) -> Result<u64> {
        self.inner.next_ticket_sequence(initial)
    }

    fn peek_ticket_sequence(&self) -> Result<Option<u64>> {
        self.inner.peek_ticket_sequence()
    }
}

/// A fixed morning so tests never depend on the wall clock
pub fn opening_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn minutes_after(start: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    start + Duration::minutes(minutes)
}

pub fn check_in_request(name: &str, services: &[(&str, u32)]) -> CheckInRequest {
    CheckInRequest {
        name: name.to_string(),
        phone: "555-0100".to_string(),
        requested_services: services
            .iter()
            .map(|(class, minutes)| ServiceRequest::new(*class, *class, *minutes))
            .collect(),
    }
}

pub fn roster(counters: &[(&str, &[&str])]) -> CounterRoster {
    CounterRoster::new(
        counters
            .iter()
            .map(|(name, classes)| Counter::new(*name, classes.iter().copied()))
            .collect(),
    )
    .unwrap()
}

/// Manager over an in-memory store, capturing events
pub fn create_test_system(
    counters: &[(&str, &[&str])],
    settings: QueueSettings,
) -> (Arc<QueueManager>, Arc<MockEventPublisher>) {
    let publisher = Arc::new(MockEventPublisher::new());
    let manager = QueueManager::new(
        Arc::new(InMemoryQueueStore::new()),
        AssignmentEngine::new(roster(counters)),
        publisher.clone(),
        settings,
    )
    .unwrap();

    (Arc::new(manager), publisher)
}
