//! Append-only activity log

use crate::core_model::Timestamp;
use parking_lot::Mutex;
use tracing::info;

/// Sink for significant session transitions
pub trait ActivityLog: Send + Sync {
    fn append(&self, event: &str, at: Timestamp);
}

/// Writes activity as structured log records
#[derive(Debug, Default)]
pub struct TracingActivityLog;

impl ActivityLog for TracingActivityLog {
    fn append(&self, event: &str, at: Timestamp) {
        info!(target: "roost::activity", at = at.as_millis(), "{}", event);
    }
}

/// Keeps activity in memory, for tests and the demo
#[derive(Debug, Default)]
pub struct MemoryActivityLog {
    entries: Mutex<Vec<(String, Timestamp)>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, Timestamp)> {
        self.entries.lock().clone()
    }

    /// Event texts only, in append order
    pub fn events(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(event, _)| event.clone()).collect()
    }
}

impl ActivityLog for MemoryActivityLog {
    fn append(&self, event: &str, at: Timestamp) {
        self.entries.lock().push((event.to_string(), at));
    }
}
