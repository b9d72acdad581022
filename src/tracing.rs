//! Event tracing for debugging rectwm.
//!
//! Keeps a ring buffer of recent notifications and state transitions so
//! the tail can be dumped when the manager dies.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;

use crate::state::StateTransition;

/// Maximum number of events to keep in the trace buffer
const DEFAULT_MAX_ENTRIES: usize = 1000;

/// A single traced event
#[derive(Debug, Clone, Serialize)]
pub struct EventLogEntry {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub details: String,
}

/// Event tracer with ring buffer storage
pub struct EventTracer {
    entries: VecDeque<EventLogEntry>,
    max_entries: usize,
    sequence: u64,
    start_time: Instant,
}

impl EventTracer {
    /// Create a new event tracer with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Create a new event tracer with specified capacity
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries),
            max_entries,
            sequence: 0,
            start_time: Instant::now(),
        }
    }

    fn timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Trace a notification from the window server
    pub fn trace_x11_event(&mut self, event_type: &str, window: Option<u32>, details: &str) {
        self.add_entry(event_type.to_string(), window, details.to_string());
    }

    /// Trace a state transition
    pub fn trace_transition(&mut self, transition: &StateTransition) {
        let (event_type, window, details) = match transition {
            StateTransition::ClientManaged { window } => {
                ("client_managed", Some(*window), String::new())
            }
            StateTransition::ClientUnmanaged { window, reason } => {
                let reason_str =
                    serde_json::to_string(reason).unwrap_or_else(|_| "unknown".to_string());
                ("client_unmanaged", Some(*window), reason_str)
            }
            StateTransition::FocusChanged { from, to } => {
                ("focus_changed", *to, format!("from={:?}", from))
            }
        };
        self.add_entry(event_type.to_string(), window, details);
    }

    fn add_entry(&mut self, event_type: String, window: Option<u32>, details: String) {
        if self.entries.len() >= self.max_entries {
            self.entries.pop_front();
        }

        self.sequence += 1;
        self.entries.push_back(EventLogEntry {
            sequence: self.sequence,
            timestamp_ms: self.timestamp(),
            event_type,
            window,
            details,
        });
    }

    /// Get the last N entries
    pub fn get_last(&self, n: usize) -> Vec<EventLogEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(start).cloned().collect()
    }

    /// Get all entries
    #[cfg(test)]
    pub fn get_all(&self) -> Vec<EventLogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Log the last `n` entries as JSON lines at error level
    pub fn dump_tail(&self, n: usize) {
        for entry in self.get_last(n) {
            match serde_json::to_string(&entry) {
                Ok(line) => log::error!("trace: {}", line),
                Err(e) => log::error!("trace: unserializable entry {}: {}", entry.sequence, e),
            }
        }
    }
}

impl Default for EventTracer {
    fn default() -> Self {
        Self::new()
    }
}
