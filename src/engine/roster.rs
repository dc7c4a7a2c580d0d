//! Counter roster and capability matching
//!
//! Counters are configuration, not persisted state. The roster keeps them in
//! their declared order, which is the canonical order the engine fills them in.

use crate::error::{QueueError, Result};
use crate::types::{CounterName, QueueEntry, ServiceClass};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// A named service point with single-occupant capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub name: CounterName,
    pub service_classes: BTreeSet<ServiceClass>,
}

impl Counter {
    pub fn new<I, S>(name: impl Into<CounterName>, service_classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ServiceClass>,
    {
        Self {
            name: name.into(),
            service_classes: service_classes.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether this counter fulfils the given class
    pub fn can_serve(&self, class: &str) -> bool {
        self.service_classes.contains(class)
    }

    /// Whether any of the entry's requested services can be handled here
    pub fn can_serve_entry(&self, entry: &QueueEntry) -> bool {
        entry
            .requested_services
            .iter()
            .any(|service| self.can_serve(&service.service_class))
    }
}

/// Ordered, validated set of counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRoster {
    counters: Vec<Counter>,
}

impl CounterRoster {
    /// Build a roster, rejecting duplicate names and counters that serve nothing
    pub fn new(counters: Vec<Counter>) -> Result<Self> {
        let mut seen = HashSet::new();
        for counter in &counters {
            if counter.name.trim().is_empty() {
                return Err(QueueError::ConfigurationError {
                    message: "counter name cannot be empty".to_string(),
                }
                .into());
            }
            if !seen.insert(counter.name.as_str()) {
                return Err(QueueError::ConfigurationError {
                    message: format!("duplicate counter name: {}", counter.name),
                }
                .into());
            }
            if counter.service_classes.is_empty() {
                return Err(QueueError::ConfigurationError {
                    message: format!("counter {} serves no service class", counter.name),
                }
                .into());
            }
        }

        Ok(Self { counters })
    }

    /// Counters in canonical order
    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Look a counter up by name
    pub fn get(&self, name: &str) -> Option<&Counter> {
        self.counters.iter().find(|c| c.name == name)
    }

    /// Every service class served by at least one counter
    pub fn service_classes(&self) -> BTreeSet<&str> {
        self.counters
            .iter()
            .flat_map(|c| c.service_classes.iter().map(String::as_str))
            .collect()
    }

    /// Whether some configured counter could ever take this entry
    pub fn is_routable(&self, entry: &QueueEntry) -> bool {
        self.counters.iter().any(|c| c.can_serve_entry(entry))
    }

    /// Counters not in `occupied`, in canonical order
    pub fn available<'a>(&'a self, occupied: &HashSet<&str>) -> Vec<&'a Counter> {
        self.counters
            .iter()
            .filter(|c| !occupied.contains(c.name.as_str()))
            .collect()
    }
}
