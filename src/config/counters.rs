//! Counter roster configuration

use crate::engine::Counter;
use serde::{Deserialize, Serialize};

/// One `[[counters]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSettings {
    pub name: String,
    pub service_classes: Vec<String>,
}

impl CounterSettings {
    pub fn new<I, S>(name: impl Into<String>, service_classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            service_classes: service_classes.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<CounterSettings> for Counter {
    fn from(settings: CounterSettings) -> Self {
        Counter::new(settings.name, settings.service_classes)
    }
}

/// Counters used when the configuration lists none
pub fn default_counters() -> Vec<CounterSettings> {
    vec![
        CounterSettings::new("Room 1", ["consultation", "general"]),
        CounterSettings::new("Room 2", ["consultation", "general"]),
        CounterSettings::new("Desk A", ["billing", "general"]),
    ]
}
