//! Queue assignment and progression
//!
//! One tick runs two ordered phases over the active queue:
//!
//! 1. **Completion scan**: in-service entries whose estimated completion has
//!    passed become serviced and leave the active set.
//! 2. **Counter fill**: every counter not held by a remaining in-service
//!    entry, in canonical roster order, takes the earliest-checked-in waiting
//!    entry that requests a service class it fulfils.
//!
//! The tick is a pure function of the queue, the clock reading and the
//! roster. It never moves an entry backwards and never places two entries on
//! one counter.

use crate::engine::roster::CounterRoster;
use crate::types::{Assignment, EntryStatus, QueueEntry, TicketNumber};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Result of a single tick
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Active queue after both phases, in input order
    pub queue: Vec<QueueEntry>,
    /// Entries completed by this tick, now `serviced`
    pub newly_serviced: Vec<QueueEntry>,
    /// Counter placements made by this tick
    pub assignments: Vec<Assignment>,
    /// Waiting entries no counter can serve, or whose service time cannot be scheduled
    pub unroutable: Vec<TicketNumber>,
}

impl TickOutcome {
    /// Whether the tick changed any entry
    pub fn is_noop(&self) -> bool {
        self.newly_serviced.is_empty() && self.assignments.is_empty()
    }
}

/// Runs ticks against a fixed counter roster
#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    roster: CounterRoster,
}

impl AssignmentEngine {
    pub fn new(roster: CounterRoster) -> Self {
        Self { roster }
    }

    pub fn roster(&self) -> &CounterRoster {
        &self.roster
    }

    /// Run one completion-then-fill pass at `now`
    pub fn tick(&self, queue: Vec<QueueEntry>, now: DateTime<Utc>) -> TickOutcome {
        let (mut active, newly_serviced) = Self::complete_due(queue, now);
        let assignments = self.fill_counters(&mut active, now);
        let unroutable = self.find_unroutable(&active, now);

        debug!(
            "Tick at {}: {} completed, {} assigned, {} active, {} unroutable",
            now,
            newly_serviced.len(),
            assignments.len(),
            active.len(),
            unroutable.len()
        );

        TickOutcome {
            queue: active,
            newly_serviced,
            assignments,
            unroutable,
        }
    }

    /// Phase 1: split off every in-service entry that is due
    fn complete_due(
        queue: Vec<QueueEntry>,
        now: DateTime<Utc>,
    ) -> (Vec<QueueEntry>, Vec<QueueEntry>) {
        let (mut done, active): (Vec<_>, Vec<_>) =
            queue.into_iter().partition(|entry| entry.is_due(now));

        for entry in &mut done {
            entry.status = EntryStatus::Serviced;
            entry.serviced_at = Some(now);
        }

        (active, done)
    }

    /// Phase 2: place waiting entries on idle counters
    fn fill_counters(&self, active: &mut [QueueEntry], now: DateTime<Utc>) -> Vec<Assignment> {
        let occupied: HashSet<String> = active
            .iter()
            .filter(|entry| entry.status == EntryStatus::InService)
            .filter_map(|entry| entry.assigned_counter.clone())
            .collect();
        let occupied: HashSet<&str> = occupied.iter().map(String::as_str).collect();

        // Indices of assignable entries, earliest check-in first
        let mut candidates: Vec<usize> = active
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_assignable() && entry.completion_time(now).is_some())
            .map(|(index, _)| index)
            .collect();
        candidates.sort_by_key(|&index| active[index].fifo_key());

        let mut assignments = Vec::new();

        for counter in self.roster.available(&occupied) {
            let Some(position) = candidates
                .iter()
                .position(|&index| counter.can_serve_entry(&active[index]))
            else {
                continue;
            };

            // Claimed entries are removed so they cannot take a second counter
            let index = candidates.remove(position);
            let entry = &mut active[index];
            let Some(eta) = entry.completion_time(now) else {
                continue;
            };

            entry.status = EntryStatus::InService;
            entry.assigned_counter = Some(counter.name.clone());
            entry.service_started_at = Some(now);
            entry.estimated_completion_time = Some(eta);

            assignments.push(Assignment {
                entry_id: entry.id,
                ticket_number: entry.ticket_number,
                counter: counter.name.clone(),
                estimated_completion_time: eta,
            });
        }

        assignments
    }

    /// Waiting entries that declare services but can never be placed
    fn find_unroutable(&self, active: &[QueueEntry], now: DateTime<Utc>) -> Vec<TicketNumber> {
        active
            .iter()
            .filter(|entry| {
                entry.status == EntryStatus::Waiting
                    && !entry.requested_services.is_empty()
                    && (!self.roster.is_routable(entry) || entry.completion_time(now).is_none())
            })
            .map(|entry| entry.ticket_number)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::roster::Counter;
    use crate::types::ServiceRequest;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn minutes(n: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(n)
    }

    fn waiting(seq: u64, checked_in: DateTime<Utc>, services: &[(&str, u32)]) -> QueueEntry {
        QueueEntry::new(
            TicketNumber::new(seq),
            format!("Visitor {}", seq),
            "555-0100",
            services
                .iter()
                .map(|(class, duration)| ServiceRequest::new(*class, *class, *duration))
                .collect(),
            checked_in,
        )
    }

    fn engine(counters: Vec<Counter>) -> AssignmentEngine {
        AssignmentEngine::new(CounterRoster::new(counters).unwrap())
    }

    fn find(queue: &[QueueEntry], seq: u64) -> &QueueEntry {
        queue
            .iter()
            .find(|e| e.ticket_number == TicketNumber::new(seq))
            .unwrap()
    }

    #[test]
    fn test_completion_then_refill() {
        let engine = engine(vec![Counter::new("Room 1", ["x"])]);
        let queue = vec![waiting(1, t0(), &[("x", 10)])];

        let first = engine.tick(queue, minutes(1));
        assert_eq!(first.assignments.len(), 1);
        let e1 = find(&first.queue, 1);
        assert_eq!(e1.status, EntryStatus::InService);
        assert_eq!(e1.assigned_counter.as_deref(), Some("Room 1"));
        assert_eq!(e1.estimated_completion_time, Some(minutes(11)));

        let mut queue = first.queue;
        queue.push(waiting(2, minutes(2), &[("x", 5)]));

        let second = engine.tick(queue, minutes(11));
        assert_eq!(second.newly_serviced.len(), 1);
        assert_eq!(second.newly_serviced[0].ticket_number, TicketNumber::new(1));
        assert_eq!(second.newly_serviced[0].status, EntryStatus::Serviced);
        assert_eq!(second.newly_serviced[0].serviced_at, Some(minutes(11)));

        assert_eq!(second.queue.len(), 1);
        let e2 = find(&second.queue, 2);
        assert_eq!(e2.status, EntryStatus::InService);
        assert_eq!(e2.assigned_counter.as_deref(), Some("Room 1"));
        assert_eq!(e2.estimated_completion_time, Some(minutes(16)));
    }

    #[test]
    fn test_not_yet_due_stays_in_service() {
        let engine = engine(vec![Counter::new("Room 1", ["x"])]);
        let first = engine.tick(vec![waiting(1, t0(), &[("x", 10)])], t0());

        let second = engine.tick(first.queue, minutes(9));
        assert!(second.newly_serviced.is_empty());
        assert_eq!(find(&second.queue, 1).status, EntryStatus::InService);
    }

    #[test]
    fn test_fifo_among_eligible_entries() {
        let engine = engine(vec![Counter::new("Room 1", ["x"])]);
        // Input order deliberately differs from check-in order
        let queue = vec![
            waiting(2, minutes(5), &[("x", 10)]),
            waiting(1, minutes(3), &[("x", 10)]),
        ];

        let outcome = engine.tick(queue, minutes(6));
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].ticket_number, TicketNumber::new(1));
        assert_eq!(find(&outcome.queue, 2).status, EntryStatus::Waiting);
    }

    #[test]
    fn test_ties_broken_by_ticket_number() {
        let engine = engine(vec![Counter::new("Room 1", ["x"])]);
        let queue = vec![
            waiting(8, t0(), &[("x", 10)]),
            waiting(7, t0(), &[("x", 10)]),
        ];

        let outcome = engine.tick(queue, minutes(1));
        assert_eq!(outcome.assignments[0].ticket_number, TicketNumber::new(7));
    }

    #[test]
    fn test_counters_filled_in_declared_order() {
        let engine = engine(vec![
            Counter::new("Room 2", ["x"]),
            Counter::new("Room 1", ["x"]),
        ]);
        let queue = vec![
            waiting(1, t0(), &[("x", 10)]),
            waiting(2, minutes(1), &[("x", 10)]),
        ];

        let outcome = engine.tick(queue, minutes(2));
        assert_eq!(outcome.assignments[0].counter, "Room 2");
        assert_eq!(outcome.assignments[0].ticket_number, TicketNumber::new(1));
        assert_eq!(outcome.assignments[1].counter, "Room 1");
        assert_eq!(outcome.assignments[1].ticket_number, TicketNumber::new(2));
    }

    #[test]
    fn test_entry_claimed_once_per_tick() {
        let engine = engine(vec![
            Counter::new("Room 1", ["x", "y"]),
            Counter::new("Room 2", ["x", "y"]),
        ]);
        let queue = vec![waiting(1, t0(), &[("x", 10), ("y", 5)])];

        let outcome = engine.tick(queue, minutes(1));
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].counter, "Room 1");
        // Duration covers every requested service
        assert_eq!(
            outcome.assignments[0].estimated_completion_time,
            minutes(16)
        );
    }

    #[test]
    fn test_capability_skips_ineligible_earlier_entry() {
        let engine = engine(vec![Counter::new("Billing", ["billing"])]);
        let queue = vec![
            waiting(1, t0(), &[("consult", 10)]),
            waiting(2, minutes(1), &[("billing", 5)]),
        ];

        let outcome = engine.tick(queue, minutes(2));
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].ticket_number, TicketNumber::new(2));
        assert_eq!(find(&outcome.queue, 1).status, EntryStatus::Waiting);
    }

    #[test]
    fn test_occupied_counter_not_reassigned() {
        let engine = engine(vec![Counter::new("Room 1", ["x"])]);
        let first = engine.tick(vec![waiting(1, t0(), &[("x", 30)])], t0());

        let mut queue = first.queue;
        queue.push(waiting(2, minutes(1), &[("x", 5)]));
        let second = engine.tick(queue, minutes(5));

        assert!(second.assignments.is_empty());
        assert_eq!(find(&second.queue, 2).status, EntryStatus::Waiting);
    }

    #[test]
    fn test_malformed_entries_are_ineligible() {
        let engine = engine(vec![Counter::new("Room 1", ["x"])]);
        let queue = vec![
            waiting(1, t0(), &[]),
            waiting(2, minutes(1), &[("x", 0)]),
        ];

        let outcome = engine.tick(queue, minutes(2));
        assert!(outcome.assignments.is_empty());
        assert!(outcome.queue.iter().all(|e| e.status == EntryStatus::Waiting));
        // An entry with no services yet is not ready, not unroutable
        assert_eq!(outcome.unroutable, vec![TicketNumber::new(2)]);
    }

    #[test]
    fn test_unrepresentable_completion_time_does_not_panic() {
        let engine = engine(vec![Counter::new("Room 1", ["x"])]);
        let huge: Vec<(&str, u32)> = vec![("x", u32::MAX); 40];
        let queue = vec![
            waiting(1, t0(), &huge),
            waiting(2, minutes(1), &[("x", 10)]),
        ];

        let outcome = engine.tick(queue, minutes(2));
        assert_eq!(outcome.unroutable, vec![TicketNumber::new(1)]);
        assert_eq!(find(&outcome.queue, 1).status, EntryStatus::Waiting);

        // The counter goes to the next visitor instead
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].ticket_number, TicketNumber::new(2));
        assert_eq!(outcome.assignments[0].estimated_completion_time, minutes(12));
    }

    #[test]
    fn test_starving_entry_reported_as_unroutable() {
        let engine = engine(vec![Counter::new("Room 1", ["x"])]);
        let mut queue = vec![waiting(1, t0(), &[("nobody-serves-this", 10)])];

        for step in 1..=50 {
            let outcome = engine.tick(queue, minutes(step));
            assert!(outcome.assignments.is_empty());
            assert_eq!(outcome.unroutable, vec![TicketNumber::new(1)]);
            queue = outcome.queue;
        }

        assert_eq!(queue[0].status, EntryStatus::Waiting);
    }

    #[test]
    fn test_repeated_tick_is_noop() {
        let engine = engine(vec![
            Counter::new("Room 1", ["x"]),
            Counter::new("Room 2", ["y"]),
        ]);
        let queue = vec![
            waiting(1, t0(), &[("x", 10)]),
            waiting(2, t0(), &[("x", 10)]),
            waiting(3, t0(), &[("z", 10)]),
        ];

        let first = engine.tick(queue, minutes(1));
        let second = engine.tick(first.queue.clone(), minutes(1));

        assert!(second.is_noop());
        assert_eq!(second.queue, first.queue);
    }

    #[test]
    fn test_clock_going_backwards_does_not_revive() {
        let engine = engine(vec![Counter::new("Room 1", ["x"])]);
        let first = engine.tick(vec![waiting(1, t0(), &[("x", 10)])], t0());
        let completed = engine.tick(first.queue, minutes(10));
        assert_eq!(completed.newly_serviced.len(), 1);

        let earlier = engine.tick(completed.queue, minutes(2));
        assert!(earlier.newly_serviced.is_empty());
        assert!(earlier.queue.is_empty());
    }

    #[test]
    fn test_counter_held_by_unknown_name_is_ignored() {
        let engine = engine(vec![Counter::new("Room 1", ["x"])]);
        let mut stray = waiting(1, t0(), &[("x", 10)]);
        stray.status = EntryStatus::InService;
        stray.assigned_counter = Some("Decommissioned".to_string());
        stray.estimated_completion_time = Some(minutes(60));

        let queue = vec![stray, waiting(2, minutes(1), &[("x", 10)])];
        let outcome = engine.tick(queue, minutes(2));

        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].counter, "Room 1");
    }
}
