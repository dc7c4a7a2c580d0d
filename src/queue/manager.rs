//! Queue manager: the single writer over the queue store
//!
//! Every mutation (check-ins, service updates, staff actions and ticks) goes
//! through [`QueueManager`]. Writes are serialized behind an async mutex and
//! land through a versioned compare-and-swap, so a second process sharing
//! the store can never silently overwrite a tick.

use crate::engine::{AssignmentEngine, CounterRoster, TickOutcome};
use crate::error::{QueueError, Result};
use crate::events::EventPublisher;
use crate::metrics::MetricsCollector;
use crate::store::{QueueSnapshot, QueueStore, Versioned};
use crate::ticket::{TicketIssuer, DEFAULT_INITIAL_TICKET};
use crate::types::{
    CheckInRequest, EntryStatus, QueueEntry, ServiceClass, ServiceRequest, StaffAction,
    StaffActionKind, TickCompleted, TicketNumber, VisitorCheckedIn,
};
use crate::utils::{current_timestamp, is_same_day};
use crate::wait_time::{
    EstimatorConfig, InMemoryStatisticsTracker, PredictionContext, SampleKind, StatisticsTracker,
    StatsKey, WaitTimeEstimate, WaitTimeEstimator,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One day per service
pub const DEFAULT_MAX_SERVICE_MINUTES: u32 = 24 * 60;

/// Tunables for the queue manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Check-ins are rejected once this many visitors are waiting
    pub max_waiting: usize,
    /// Attempts at a compare-and-swap before giving up
    pub max_write_retries: u32,
    /// Seed for the ticket counter the first time it is used
    pub initial_ticket_number: u64,
    /// Longest accepted average duration for a single service
    pub max_service_minutes: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_waiting: 20,
            max_write_retries: 5,
            initial_ticket_number: DEFAULT_INITIAL_TICKET,
            max_service_minutes: DEFAULT_MAX_SERVICE_MINUTES,
        }
    }
}

/// Statistics about queue manager operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueManagerStats {
    /// Total successful check-ins
    pub check_ins: u64,
    /// Check-ins rejected because the queue was full
    pub rejected_check_ins: u64,
    /// Total ticks run
    pub ticks_run: u64,
    /// Total visitors placed on a counter
    pub assignments_made: u64,
    /// Total visitors serviced, by tick or by staff
    pub visitors_serviced: u64,
    /// Manual staff resolutions
    pub staff_resolutions: u64,
    /// Manual staff transfers
    pub transfers: u64,
    /// Compare-and-swap attempts lost to another writer
    pub write_conflicts: u64,
    /// Current number of visitors waiting
    pub waiting: usize,
    /// Current number of visitors at a counter
    pub in_service: usize,
    /// Waiting visitors no counter can serve, as of the last tick
    pub unroutable: usize,
}

/// The queue manager
pub struct QueueManager {
    /// Durable queue state
    store: Arc<dyn QueueStore>,
    /// Ticket allocation
    issuer: TicketIssuer,
    /// Pure tick logic over the counter roster
    engine: AssignmentEngine,
    /// Wait-time estimates for visitors
    estimator: Arc<WaitTimeEstimator>,
    /// Event publisher for queue observers
    event_publisher: Arc<dyn EventPublisher>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
    /// Handling-time history fed to the estimator
    stats_tracker: Arc<dyn StatisticsTracker>,
    settings: QueueSettings,
    /// Held for the whole read-modify-write of every mutation
    writer: tokio::sync::Mutex<()>,
    /// Manager statistics
    stats: RwLock<QueueManagerStats>,
    /// Unroutable tickets reported by the previous tick
    last_unroutable: Mutex<Vec<TicketNumber>>,
}

impl QueueManager {
    /// Create a queue manager with its own metrics and a fallback-only estimator
    pub fn new(
        store: Arc<dyn QueueStore>,
        engine: AssignmentEngine,
        event_publisher: Arc<dyn EventPublisher>,
        settings: QueueSettings,
    ) -> Result<Self> {
        let metrics_collector = Arc::new(MetricsCollector::new()?);
        let estimator = Arc::new(WaitTimeEstimator::fallback_only(EstimatorConfig::default())?);

        Ok(Self {
            issuer: TicketIssuer::new(store.clone(), settings.initial_ticket_number),
            store,
            engine,
            estimator,
            event_publisher,
            metrics_collector,
            stats_tracker: Arc::new(InMemoryStatisticsTracker::default()),
            settings,
            writer: tokio::sync::Mutex::new(()),
            stats: RwLock::new(QueueManagerStats::default()),
            last_unroutable: Mutex::new(Vec::new()),
        })
    }

    /// Use a shared metrics collector
    pub fn with_metrics(mut self, metrics_collector: Arc<MetricsCollector>) -> Self {
        self.metrics_collector = metrics_collector;
        self
    }

    /// Use a configured estimator
    pub fn with_estimator(mut self, estimator: Arc<WaitTimeEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Use a shared statistics tracker
    pub fn with_stats_tracker(mut self, stats_tracker: Arc<dyn StatisticsTracker>) -> Self {
        self.stats_tracker = stats_tracker;
        self
    }

    pub fn roster(&self) -> &CounterRoster {
        self.engine.roster()
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn issuer(&self) -> &TicketIssuer {
        &self.issuer
    }

    /// Check a visitor in at the current time
    pub async fn check_in(&self, request: CheckInRequest) -> Result<QueueEntry> {
        self.check_in_at(request, current_timestamp()).await
    }

    /// Check a visitor in at `now`
    ///
    /// Capacity is checked before a ticket is issued, so a rejected check-in
    /// consumes no ticket number. The one exception is a lost compare-and-swap
    /// whose retry finds the queue filled by another writer: the number issued
    /// on the first attempt is then skipped.
    pub async fn check_in_at(
        &self,
        request: CheckInRequest,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        let timer = self.metrics_collector.start_timer();
        validate_contact(&request.name)?;
        validate_services(&request.requested_services, self.settings.max_service_minutes)?;

        let max_waiting = self.settings.max_waiting;
        let mut ticket: Option<TicketNumber> = None;

        let result = self
            .mutate("check_in", |snapshot| {
                let waiting = snapshot.waiting_count();
                if waiting >= max_waiting {
                    return Err(QueueError::QueueFull { max_waiting }.into());
                }

                // Reuse the ticket across CAS retries
                let ticket_number = match ticket {
                    Some(issued) => issued,
                    None => {
                        let issued = self.issuer.issue()?;
                        ticket = Some(issued);
                        issued
                    }
                };

                let entry = QueueEntry::new(
                    ticket_number,
                    request.name.trim(),
                    request.phone.trim(),
                    request.requested_services.clone(),
                    now,
                );
                snapshot.queue.push(entry.clone());
                Ok((entry, waiting + 1))
            })
            .await;

        let (entry, waiting_count) = match result {
            Ok(value) => value,
            Err(e) => {
                if let Some(QueueError::QueueFull { .. }) = e.downcast_ref::<QueueError>() {
                    warn!("Check-in rejected for '{}': {}", request.name, e);
                    self.metrics_collector.record_rejection("queue_full");
                    self.update_stats(|stats| stats.rejected_check_ins += 1);
                }
                return Err(e);
            }
        };

        info!(
            "Checked in '{}' as {} ({} waiting)",
            entry.name, entry.ticket_number, waiting_count
        );

        self.metrics_collector.record_check_in(timer.stop());
        self.update_stats(|stats| {
            stats.check_ins += 1;
            stats.waiting = waiting_count;
        });

        if let Err(e) = self
            .event_publisher
            .publish_visitor_checked_in(VisitorCheckedIn {
                entry: entry.clone(),
                waiting_count,
            })
            .await
        {
            warn!("Failed to publish check-in of {}: {}", entry.ticket_number, e);
        }

        Ok(entry)
    }

    /// Replace the requested services of a waiting visitor
    pub async fn update_services(
        &self,
        ticket: TicketNumber,
        services: Vec<ServiceRequest>,
    ) -> Result<QueueEntry> {
        validate_services(&services, self.settings.max_service_minutes)?;

        let entry = self
            .mutate("update_services", |snapshot| {
                let entry = waiting_entry(snapshot, ticket, "update services of")?;
                entry.requested_services = services.clone();
                Ok(entry.clone())
            })
            .await?;

        debug!(
            "Ticket {} now requests {} service(s)",
            ticket,
            entry.requested_services.len()
        );
        Ok(entry)
    }

    /// Correct the contact details of a waiting visitor
    pub async fn update_contact(
        &self,
        ticket: TicketNumber,
        name: &str,
        phone: &str,
    ) -> Result<QueueEntry> {
        validate_contact(name)?;

        self.mutate("update_contact", |snapshot| {
            let entry = waiting_entry(snapshot, ticket, "update contact of")?;
            entry.name = name.trim().to_string();
            entry.phone = phone.trim().to_string();
            Ok(entry.clone())
        })
        .await
    }

    /// Look a ticket up in the active queue and the serviced history
    pub async fn find_ticket(&self, ticket: TicketNumber) -> Result<QueueEntry> {
        let snapshot = self.store.load()?.value;
        snapshot
            .find(ticket)
            .cloned()
            .ok_or_else(|| unknown_ticket(ticket))
    }

    /// Look a ticket up by its printed label (`A-042`)
    pub async fn find_ticket_label(&self, label: &str) -> Result<QueueEntry> {
        let ticket = label
            .trim()
            .parse::<TicketNumber>()
            .map_err(|_| QueueError::UnknownTicket {
                ticket: label.to_string(),
            })?;
        self.find_ticket(ticket).await
    }

    /// 1-based FIFO position of a waiting ticket, `None` once it left the line
    pub async fn queue_position(&self, ticket: TicketNumber) -> Result<Option<usize>> {
        let snapshot = self.store.load()?.value;
        let entry = snapshot.find(ticket).ok_or_else(|| unknown_ticket(ticket))?;
        if entry.status != EntryStatus::Waiting {
            return Ok(None);
        }

        let key = entry.fifo_key();
        let ahead = snapshot
            .queue
            .iter()
            .filter(|e| e.status == EntryStatus::Waiting && e.fifo_key() < key)
            .count();
        Ok(Some(ahead + 1))
    }

    /// Staff marks an in-service visitor as done before the estimate elapses
    pub async fn resolve(
        &self,
        ticket: TicketNumber,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        let entry = self
            .mutate("resolve", |snapshot| {
                let position = snapshot
                    .queue
                    .iter()
                    .position(|e| e.ticket_number == ticket)
                    .ok_or_else(|| missing_from_queue(snapshot, ticket, "resolve"))?;
                if snapshot.queue[position].status != EntryStatus::InService {
                    return Err(invalid_transition(&snapshot.queue[position], "resolve"));
                }

                let mut entry = snapshot.queue.remove(position);
                entry.status = EntryStatus::Serviced;
                entry.serviced_at = Some(now);
                entry.service_notes = notes.clone();
                snapshot.serviced.push(entry.clone());
                Ok(entry)
            })
            .await?;

        info!(
            "Staff resolved {} at {}",
            entry.ticket_number,
            entry.assigned_counter.as_deref().unwrap_or("unknown counter")
        );

        self.record_handling_time(&entry);
        self.metrics_collector.record_staff_action("resolved");
        self.metrics_collector
            .queue()
            .visitors_serviced_total
            .inc();
        self.update_stats(|stats| {
            stats.staff_resolutions += 1;
            stats.visitors_serviced += 1;
        });

        self.publish_staff_action(&entry, StaffActionKind::Resolved, now)
            .await;
        Ok(entry)
    }

    /// Staff moves an in-service visitor to another idle counter
    ///
    /// The estimated completion time is kept.
    pub async fn transfer(
        &self,
        ticket: TicketNumber,
        to_counter: &str,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry> {
        let target = self
            .roster()
            .get(to_counter)
            .cloned()
            .ok_or_else(|| QueueError::UnknownCounter {
                counter: to_counter.to_string(),
            })?;

        let (entry, from) = self
            .mutate("transfer", |snapshot| {
                let occupied = snapshot.queue.iter().any(|e| {
                    e.status == EntryStatus::InService
                        && e.assigned_counter.as_deref() == Some(target.name.as_str())
                });

                let position = snapshot
                    .queue
                    .iter()
                    .position(|e| e.ticket_number == ticket)
                    .ok_or_else(|| missing_from_queue(snapshot, ticket, "transfer"))?;
                let entry = &mut snapshot.queue[position];

                if entry.status != EntryStatus::InService {
                    return Err(invalid_transition(entry, "transfer"));
                }
                if occupied {
                    return Err(QueueError::CounterUnavailable {
                        counter: target.name.clone(),
                    }
                    .into());
                }
                if !target.can_serve_entry(entry) {
                    return Err(QueueError::InvalidServiceRequest {
                        reason: format!(
                            "counter {} serves none of the services requested by {}",
                            target.name, entry.ticket_number
                        ),
                    }
                    .into());
                }

                let from = entry.assigned_counter.clone().unwrap_or_default();
                entry.assigned_counter = Some(target.name.clone());
                Ok((entry.clone(), from))
            })
            .await?;

        info!(
            "Staff transferred {} from {} to {}",
            entry.ticket_number, from, target.name
        );

        self.metrics_collector.record_staff_action("transferred");
        self.update_stats(|stats| stats.transfers += 1);

        self.publish_staff_action(
            &entry,
            StaffActionKind::Transferred {
                from,
                to: target.name.clone(),
            },
            now,
        )
        .await;
        Ok(entry)
    }

    /// Attach visitor feedback to a serviced entry
    pub async fn add_feedback(&self, ticket: TicketNumber, feedback: &str) -> Result<QueueEntry> {
        let feedback = feedback.trim().to_string();

        self.mutate("add_feedback", |snapshot| {
            if let Some(entry) = snapshot.find_serviced_mut(ticket) {
                entry.feedback = Some(feedback.clone());
                return Ok(entry.clone());
            }
            match snapshot.find(ticket) {
                Some(entry) => Err(invalid_transition(entry, "add feedback to")),
                None => Err(unknown_ticket(ticket)),
            }
        })
        .await
    }

    /// Run one completion-then-fill tick at `now`
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let started = Instant::now();

        let outcome = self
            .mutate("tick", |snapshot| {
                let queue = std::mem::take(&mut snapshot.queue);
                let outcome = self.engine.tick(queue, now);
                snapshot.queue = outcome.queue.clone();
                snapshot
                    .serviced
                    .extend(outcome.newly_serviced.iter().cloned());
                Ok(outcome)
            })
            .await?;

        for entry in &outcome.newly_serviced {
            self.record_handling_time(entry);
        }
        for assignment in &outcome.assignments {
            if let Some(entry) = outcome
                .queue
                .iter()
                .find(|e| e.id == assignment.entry_id)
            {
                let waited = (now - entry.check_in_time).to_std().unwrap_or_default();
                self.metrics_collector
                    .record_assignment(&assignment.counter, waited);
                for class in distinct_classes(entry) {
                    self.record_sample(StatsKey::queue_wait(class), waited);
                }
            }
        }

        let waiting = count_status(&outcome.queue, EntryStatus::Waiting);
        let in_service = count_status(&outcome.queue, EntryStatus::InService);
        self.metrics_collector
            .record_tick(started.elapsed(), outcome.newly_serviced.len(), outcome.unroutable.len());
        self.metrics_collector.update_queue_gauges(waiting, in_service);
        self.update_stats(|stats| {
            stats.ticks_run += 1;
            stats.assignments_made += outcome.assignments.len() as u64;
            stats.visitors_serviced += outcome.newly_serviced.len() as u64;
            stats.waiting = waiting;
            stats.in_service = in_service;
            stats.unroutable = outcome.unroutable.len();
        });

        let unroutable_changed = self.note_unroutable(&outcome.unroutable);

        if outcome.is_noop() {
            debug!("Tick at {}: nothing to do ({} waiting)", now, waiting);
        } else {
            for assignment in &outcome.assignments {
                info!(
                    "{} assigned to {} until {}",
                    assignment.ticket_number,
                    assignment.counter,
                    assignment.estimated_completion_time
                );
            }
            info!(
                "Tick at {}: {} serviced, {} assigned, {} waiting",
                now,
                outcome.newly_serviced.len(),
                outcome.assignments.len(),
                waiting
            );
        }

        if !outcome.is_noop() || unroutable_changed {
            let event = TickCompleted {
                now,
                newly_serviced: outcome.newly_serviced.clone(),
                assignments: outcome.assignments.clone(),
                unroutable: outcome.unroutable.clone(),
                queue: outcome.queue.clone(),
            };
            if let Err(e) = self.event_publisher.publish_tick_completed(event).await {
                warn!("Failed to publish tick delta: {}", e);
            }
        }

        Ok(outcome)
    }

    /// Current persisted queue state
    pub async fn snapshot(&self) -> Result<QueueSnapshot> {
        Ok(self.store.load()?.value)
    }

    /// Estimate how long a visitor checking in at `now` would wait
    pub async fn estimate_wait(&self, now: DateTime<Utc>) -> Result<WaitTimeEstimate> {
        let snapshot = self.store.load()?.value;

        let mut service_mix: BTreeMap<ServiceClass, usize> = BTreeMap::new();
        for entry in snapshot
            .queue
            .iter()
            .filter(|e| e.status == EntryStatus::Waiting)
        {
            for class in distinct_classes(entry) {
                *service_mix.entry(class).or_default() += 1;
            }
        }

        let handling_averages = self.history(SampleKind::Handling);
        let queue_wait_averages = self.history(SampleKind::QueueWait);

        let context = PredictionContext {
            queue_length: snapshot.waiting_count(),
            active_staff: self.roster().len(),
            serviced_today: snapshot
                .serviced
                .iter()
                .filter(|e| e.serviced_at.map(|at| is_same_day(at, now)).unwrap_or(false))
                .count(),
            service_mix,
            handling_averages,
            queue_wait_averages,
        };

        Ok(self.estimator.estimate_with_context(context).await)
    }

    /// Get manager statistics
    pub async fn get_stats(&self) -> Result<QueueManagerStats> {
        let snapshot = self.store.load()?.value;
        let mut stats = self
            .stats
            .read()
            .map_err(|_| QueueError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?
            .clone();

        stats.waiting = snapshot.waiting_count();
        stats.in_service = snapshot.in_service_count();
        Ok(stats)
    }

    /// Read-modify-write the snapshot under the writer lock with CAS retries
    async fn mutate<T, F>(&self, action: &str, mut apply: F) -> Result<T>
    where
        F: FnMut(&mut QueueSnapshot) -> Result<T>,
    {
        let _writer = self.writer.lock().await;
        let attempts = self.settings.max_write_retries.max(1);

        for attempt in 1..=attempts {
            let Versioned {
                version,
                value: mut snapshot,
            } = self.store.load()?;

            let result = apply(&mut snapshot)?;

            if self.store.compare_and_swap(version, snapshot)? {
                return Ok(result);
            }

            warn!(
                "Queue store changed underneath {} (attempt {}/{}), retrying",
                action, attempt, attempts
            );
            self.metrics_collector.record_write_conflict();
            self.update_stats(|stats| stats.write_conflicts += 1);
        }

        Err(QueueError::WriteConflict { attempts }.into())
    }

    /// Stats are advisory; a poisoned lock never fails a committed write
    fn update_stats(&self, update: impl FnOnce(&mut QueueManagerStats)) {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => warn!("Failed to acquire stats lock, manager statistics not updated"),
        }
    }

    /// Remember the unroutable set, returning whether it changed
    fn note_unroutable(&self, unroutable: &[TicketNumber]) -> bool {
        let mut last = match self.last_unroutable.lock() {
            Ok(last) => last,
            Err(_) => {
                warn!("Failed to acquire unroutable lock, reporting the set as changed");
                return true;
            }
        };

        if last.as_slice() == unroutable {
            return false;
        }

        if !unroutable.is_empty() {
            let tickets: Vec<String> = unroutable.iter().map(ToString::to_string).collect();
            warn!(
                "No configured counter serves the services requested by: {}",
                tickets.join(", ")
            );
        }

        *last = unroutable.to_vec();
        true
    }

    /// Split the actual handling time across the requested services
    fn record_handling_time(&self, entry: &QueueEntry) {
        let (Some(started), Some(finished)) = (entry.service_started_at, entry.serviced_at) else {
            return;
        };
        let Ok(actual) = (finished - started).to_std() else {
            return;
        };
        let total = entry.total_service_minutes();
        if total <= 0 {
            return;
        }

        for service in &entry.requested_services {
            let share = f64::from(service.duration_minutes) / total as f64;
            self.record_sample(
                StatsKey::handling(service.service_class.clone()),
                actual.mul_f64(share),
            );
        }
    }

    /// Mean minutes per class, empty when the history cannot be read
    fn history(&self, kind: SampleKind) -> BTreeMap<ServiceClass, f64> {
        match self.stats_tracker.averages(kind) {
            Ok(averages) => averages.into_iter().collect(),
            Err(e) => {
                warn!("{:?} history unavailable: {}", kind, e);
                BTreeMap::new()
            }
        }
    }

    fn record_sample(&self, key: StatsKey, sample: std::time::Duration) {
        if let Err(e) = self.stats_tracker.record(key, sample) {
            warn!("Failed to record queue statistics: {}", e);
        }
    }

    async fn publish_staff_action(
        &self,
        entry: &QueueEntry,
        action: StaffActionKind,
        now: DateTime<Utc>,
    ) {
        let event = StaffAction {
            ticket_number: entry.ticket_number,
            action,
            entry: entry.clone(),
            timestamp: now,
        };
        if let Err(e) = self.event_publisher.publish_staff_action(event).await {
            warn!(
                "Failed to publish staff action on {}: {}",
                entry.ticket_number, e
            );
        }
    }
}

fn validate_contact(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(QueueError::InvalidServiceRequest {
            reason: "visitor name cannot be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

fn validate_services(services: &[ServiceRequest], max_minutes: u32) -> Result<()> {
    for service in services {
        let reason = if service.service_class.trim().is_empty() {
            format!("service '{}' has no service class", service.name)
        } else if service.duration_minutes == 0 {
            format!("service '{}' has no duration", service.name)
        } else if service.duration_minutes > max_minutes {
            format!(
                "service '{}' lasts {} minutes, over the {} minute limit",
                service.name, service.duration_minutes, max_minutes
            )
        } else {
            continue;
        };
        return Err(QueueError::InvalidServiceRequest { reason }.into());
    }
    Ok(())
}

fn unknown_ticket(ticket: TicketNumber) -> anyhow::Error {
    QueueError::UnknownTicket {
        ticket: ticket.to_string(),
    }
    .into()
}

fn invalid_transition(entry: &QueueEntry, action: &str) -> anyhow::Error {
    QueueError::InvalidTransition {
        ticket: entry.ticket_number.to_string(),
        status: entry.status.to_string(),
        action: action.to_string(),
    }
    .into()
}

/// Error for a ticket absent from the active queue
fn missing_from_queue(snapshot: &QueueSnapshot, ticket: TicketNumber, action: &str) -> anyhow::Error {
    match snapshot.find(ticket) {
        Some(entry) => invalid_transition(entry, action),
        None => unknown_ticket(ticket),
    }
}

/// Mutable access to an entry that must still be waiting
fn waiting_entry<'a>(
    snapshot: &'a mut QueueSnapshot,
    ticket: TicketNumber,
    action: &str,
) -> Result<&'a mut QueueEntry> {
    let position = snapshot
        .queue
        .iter()
        .position(|e| e.ticket_number == ticket)
        .ok_or_else(|| missing_from_queue(snapshot, ticket, action))?;

    let entry = &mut snapshot.queue[position];
    if entry.status != EntryStatus::Waiting {
        return Err(invalid_transition(entry, action));
    }
    Ok(entry)
}

fn count_status(queue: &[QueueEntry], status: EntryStatus) -> usize {
    queue.iter().filter(|e| e.status == status).count()
}

fn distinct_classes(entry: &QueueEntry) -> Vec<ServiceClass> {
    let mut classes: Vec<ServiceClass> = entry
        .requested_services
        .iter()
        .map(|s| s.service_class.clone())
        .collect();
    classes.sort();
    classes.dedup();
    classes
}
