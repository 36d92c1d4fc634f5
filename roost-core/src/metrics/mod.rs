//! Metrics for stores, the content filter and the session

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};

/// Initialize metrics with descriptions
pub fn init_metrics() {
    // Store metrics
    describe_counter!("store.fetch.success", "Remote fetches that replaced store contents");
    describe_counter!("store.fetch.failure", "Remote fetches that failed");
    describe_counter!("store.fetch.kept_stale", "Refreshes that kept already shown items");
    describe_counter!("store.cache.hit", "Store initializations served from the snapshot cache");
    describe_counter!("store.cache.miss", "Store initializations with no usable snapshot");

    // Filter metrics
    describe_counter!("filter.checks", "Texts checked against the content filter");
    describe_counter!("filter.matches", "Texts that matched a filtered term");
    describe_counter!("filter.checks.unready", "Texts checked before the content filter was enabled");
    describe_histogram!("filter.check.duration_ms", "Content filter check duration in milliseconds");

    // Session metrics
    describe_counter!("session.sign_in", "Completed sign-ins");
    describe_counter!("session.saga.completed", "Completed profile creation sagas");
    describe_counter!("session.saga.warnings", "Non-fatal steps that failed during profile creation");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a histogram metric
pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        record_histogram(self.name, duration.as_secs_f64() * 1000.0);
    }
}
