use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::PROGRESS_LOG_CAPACITY;
use crate::runs::RunCounters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub message: String,
    pub severity: Severity,
    pub at: String,
}

#[derive(Default)]
struct ProgressState {
    entries: VecDeque<ProgressEntry>,
    counters: RunCounters,
}

/// Bounded, in-memory progress feed for status polling.
///
/// Entries are mirrored to the `log` facade. Nothing here survives a restart.
pub struct ProgressLog {
    state: Mutex<ProgressState>,
    capacity: usize,
}

impl ProgressLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(ProgressState::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info | Severity::Success => info!("[Sync] {}", message),
            Severity::Warning => warn!("[Sync] {}", message),
            Severity::Error => error!("[Sync] {}", message),
        }
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.entries.len() == self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(ProgressEntry {
            message,
            severity,
            at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(Severity::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// Publishes a counters snapshot for pollers.
    pub fn publish(&self, counters: &RunCounters) {
        if let Ok(mut state) = self.state.lock() {
            state.counters = counters.clone();
        }
    }

    pub fn entries(&self) -> Vec<ProgressEntry> {
        self.state
            .lock()
            .map(|state| state.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn counters(&self) -> RunCounters {
        self.state
            .lock()
            .map(|state| state.counters.clone())
            .unwrap_or_default()
    }

    /// Drops entries and counters from the previous run.
    pub fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = ProgressState::default();
        }
    }
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::new(PROGRESS_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_entries_fall_off_at_capacity() {
        let log = ProgressLog::new(2);
        log.info("one");
        log.warning("two");
        log.error("three");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "two");
        assert_eq!(entries[0].severity, Severity::Warning);
        assert_eq!(entries[1].severity, Severity::Error);
    }

    #[test]
    fn reset_clears_entries_and_counters() {
        let log = ProgressLog::default();
        let mut counters = RunCounters::default();
        counters.devices.processed = 3;
        log.publish(&counters);
        log.info("started");

        log.reset();
        assert!(log.entries().is_empty());
        assert_eq!(log.counters(), RunCounters::default());
    }
}
