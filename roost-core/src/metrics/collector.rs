//! In-process tally of app activity
//!
//! The `metrics` facade has no recorder unless the embedding app installs
//! one; this collector keeps the handful of numbers the CLI reports itself.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counts of store refreshes, filter checks and sign-ins
#[derive(Debug, Default)]
pub struct MetricsCollector {
    fetches: AtomicU64,
    stale_keeps: AtomicU64,
    filter_checks: AtomicU64,
    filter_matches: AtomicU64,
    sign_ins: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_fetches(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stale_keeps(&self) {
        self.stale_keeps.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one filter check and whether it matched
    pub fn record_filter_check(&self, matched: bool) {
        self.filter_checks.fetch_add(1, Ordering::Relaxed);
        if matched {
            self.filter_matches.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_sign_ins(&self) {
        self.sign_ins.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: std::time::SystemTime::now(),
            fetches: self.fetches.load(Ordering::Relaxed),
            stale_keeps: self.stale_keeps.load(Ordering::Relaxed),
            filter_checks: self.filter_checks.load(Ordering::Relaxed),
            filter_matches: self.filter_matches.load(Ordering::Relaxed),
            sign_ins: self.sign_ins.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot for reporting
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    #[serde(skip)]
    pub timestamp: std::time::SystemTime,
    pub fetches: u64,
    pub stale_keeps: u64,
    pub filter_checks: u64,
    pub filter_matches: u64,
    pub sign_ins: u64,
}
