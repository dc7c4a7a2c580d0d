//! Common types used throughout the queue service

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for queue entries
pub type EntryId = Uuid;

/// Name of a class of service a counter can fulfil (e.g. "consultation")
pub type ServiceClass = String;

/// Name of a counter (e.g. "Room 1")
pub type CounterName = String;

/// Prefix printed in front of every ticket sequence number
pub const TICKET_PREFIX: &str = "A-";

/// Visitor-facing ticket number, rendered as `A-###`
///
/// The sequence is kept numerically so that ordering does not depend on
/// string width once tickets pass `A-999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TicketNumber(u64);

impl TicketNumber {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    /// Numeric part of the ticket
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", TICKET_PREFIX, self.0)
    }
}

impl FromStr for TicketNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(TICKET_PREFIX)
            .ok_or_else(|| format!("ticket '{}' must start with '{}'", s, TICKET_PREFIX))?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("ticket '{}' has a malformed sequence", s));
        }
        digits
            .parse()
            .map(TicketNumber)
            .map_err(|e| format!("ticket '{}': {}", s, e))
    }
}

impl TryFrom<String> for TicketNumber {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TicketNumber> for String {
    fn from(ticket: TicketNumber) -> Self {
        ticket.to_string()
    }
}

/// Lifecycle of a queue entry; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryStatus {
    Waiting,
    InService,
    Serviced,
}

impl EntryStatus {
    /// Position in the lifecycle, used to check forward-only progress
    pub fn rank(&self) -> u8 {
        match self {
            EntryStatus::Waiting => 0,
            EntryStatus::InService => 1,
            EntryStatus::Serviced => 2,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Waiting => write!(f, "waiting"),
            EntryStatus::InService => write!(f, "in-service"),
            EntryStatus::Serviced => write!(f, "serviced"),
        }
    }
}

/// One service a visitor asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Display name of the service
    pub name: String,
    /// Counter class able to fulfil it
    pub service_class: ServiceClass,
    /// Average handling time in minutes
    pub duration_minutes: u32,
}

impl ServiceRequest {
    pub fn new(
        name: impl Into<String>,
        service_class: impl Into<ServiceClass>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            name: name.into(),
            service_class: service_class.into(),
            duration_minutes,
        }
    }
}

/// One visitor's presence in the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub ticket_number: TicketNumber,
    pub name: String,
    pub phone: String,
    pub check_in_time: DateTime<Utc>,
    pub status: EntryStatus,
    pub requested_services: Vec<ServiceRequest>,
    pub assigned_counter: Option<CounterName>,
    pub service_started_at: Option<DateTime<Utc>>,
    pub estimated_completion_time: Option<DateTime<Utc>>,
    pub serviced_at: Option<DateTime<Utc>>,
    pub service_notes: Option<String>,
    pub feedback: Option<String>,
}

impl QueueEntry {
    /// Create a freshly checked-in, waiting entry
    pub fn new(
        ticket_number: TicketNumber,
        name: impl Into<String>,
        phone: impl Into<String>,
        requested_services: Vec<ServiceRequest>,
        check_in_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: crate::utils::generate_entry_id(),
            ticket_number,
            name: name.into(),
            phone: phone.into(),
            check_in_time,
            status: EntryStatus::Waiting,
            requested_services,
            assigned_counter: None,
            service_started_at: None,
            estimated_completion_time: None,
            serviced_at: None,
            service_notes: None,
            feedback: None,
        }
    }

    /// Sum of the average durations of every requested service
    pub fn total_service_minutes(&self) -> i64 {
        self.requested_services
            .iter()
            .map(|service| i64::from(service.duration_minutes))
            .sum()
    }

    /// When service would finish if it started at `now`
    ///
    /// `None` for a zero total or a completion time chrono cannot represent.
    pub fn completion_time(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let minutes = self.total_service_minutes();
        if minutes <= 0 {
            return None;
        }
        Duration::try_minutes(minutes).and_then(|total| now.checked_add_signed(total))
    }

    /// Whether the entry is well-formed enough to be put on a counter
    pub fn is_assignable(&self) -> bool {
        self.status == EntryStatus::Waiting
            && !self.requested_services.is_empty()
            && self.total_service_minutes() > 0
    }

    /// Whether any requested service belongs to the given class
    pub fn requests_class(&self, class: &str) -> bool {
        self.requested_services
            .iter()
            .any(|service| service.service_class == class)
    }

    /// Whether the entry has finished its service at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == EntryStatus::InService
            && self
                .estimated_completion_time
                .map(|eta| eta <= now)
                .unwrap_or(false)
    }

    /// Key used for FIFO ordering among waiting entries
    pub fn fifo_key(&self) -> (DateTime<Utc>, TicketNumber) {
        (self.check_in_time, self.ticket_number)
    }
}

/// Front-door request to join the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub name: String,
    pub phone: String,
    /// May be empty; services can be declared later while waiting
    #[serde(default)]
    pub requested_services: Vec<ServiceRequest>,
}

/// A waiting entry placed on a counter during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub entry_id: EntryId,
    pub ticket_number: TicketNumber,
    pub counter: CounterName,
    pub estimated_completion_time: DateTime<Utc>,
}

/// Delta published after each tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickCompleted {
    pub now: DateTime<Utc>,
    pub newly_serviced: Vec<QueueEntry>,
    pub assignments: Vec<Assignment>,
    pub unroutable: Vec<TicketNumber>,
    pub queue: Vec<QueueEntry>,
}

/// Event emitted when a visitor checks in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorCheckedIn {
    pub entry: QueueEntry,
    pub waiting_count: usize,
}

/// Event emitted when staff complete or move a visitor by hand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffAction {
    pub ticket_number: TicketNumber,
    pub action: StaffActionKind,
    pub entry: QueueEntry,
    pub timestamp: DateTime<Utc>,
}

/// Kind of manual staff intervention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StaffActionKind {
    Resolved,
    Transferred { from: CounterName, to: CounterName },
}

/// Union type for all queue events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    VisitorCheckedIn(VisitorCheckedIn),
    TickCompleted(TickCompleted),
    StaffAction(StaffAction),
}
