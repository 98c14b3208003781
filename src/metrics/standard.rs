//! Pre-aggregated standard metrics
//!
//! Request and dependency completions aggregated in-process and drained on
//! the standard tick, independent of the performance counter gauges. The
//! accumulators are increment-only for producers and swap-reset by the
//! single standard-tick consumer.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::counters::{DataPoint, TickOutcome};

#[derive(Default)]
struct Aggregate {
    duration_sum_us: AtomicU64,
    count: AtomicU64,
    failure_count: AtomicU64,
}

impl Aggregate {
    fn record(&self, duration_ms: f64, success: bool) {
        self.duration_sum_us
            .fetch_add((duration_ms * 1_000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Read-and-reset, returning (count, failures, average duration ms).
    fn drain(&self) -> (u64, u64, f64) {
        let sum_ms = self.duration_sum_us.swap(0, Ordering::Relaxed) as f64 / 1_000.0;
        let count = self.count.swap(0, Ordering::Relaxed);
        let failures = self.failure_count.swap(0, Ordering::Relaxed);
        let avg = if count == 0 { 0.0 } else { sum_ms / count as f64 };
        (count, failures, avg)
    }
}

/// Aggregates request/dependency telemetry for the standard destination.
pub struct StandardMetricsHandler {
    requests: Aggregate,
    dependencies: Aggregate,
}

/// Instruments this handler registers, fixed at construction.
pub const STANDARD_METRIC_COUNT: usize = 6;

impl StandardMetricsHandler {
    pub fn new() -> Self {
        Self {
            requests: Aggregate::default(),
            dependencies: Aggregate::default(),
        }
    }

    pub fn record_request(&self, duration_ms: f64, success: bool) {
        self.requests.record(duration_ms, success);
    }

    pub fn record_dependency(&self, duration_ms: f64, success: bool) {
        self.dependencies.record(duration_ms, success);
    }

    /// Drain the window into data points. Counters with no activity report
    /// zero, not absent.
    pub fn collect(&self) -> TickOutcome {
        let (req_count, req_failed, req_avg) = self.requests.drain();
        let (dep_count, dep_failed, dep_avg) = self.dependencies.drain();

        TickOutcome {
            points: vec![
                DataPoint::named("requests_count", req_count as f64),
                DataPoint::named("requests_failed", req_failed as f64),
                DataPoint::named("requests_duration", req_avg),
                DataPoint::named("dependencies_count", dep_count as f64),
                DataPoint::named("dependencies_failed", dep_failed as f64),
                DataPoint::named("dependencies_duration", dep_avg),
            ],
            errors: vec![],
        }
    }

    pub fn instrument_count(&self) -> usize {
        STANDARD_METRIC_COUNT
    }
}

impl Default for StandardMetricsHandler {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
