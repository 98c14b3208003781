//! Performance Collector
//!
//! Owns the two performance gauge sets (standard-frequency and
//! live-frequency) and turns the counter registry into data points, one
//! consistent window per destination per tick. The two destinations never
//! share an accumulator: each drains its own window from the registry on
//! its own schedule.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use crate::counters::{
    CounterRegistry, Destination, Gauge, GaugeId, GaugeSet, TickOutcome, TickSample,
};

/// Dual-destination performance counter collector.
pub struct PerformanceCollector {
    registry: Arc<CounterRegistry>,
    standard: GaugeSet,
    live: GaugeSet,
    standard_last_tick: Mutex<Option<Instant>>,
    live_last_tick: Mutex<Option<Instant>>,
}

impl PerformanceCollector {
    /// Build the collector and both gauge sets. Gauges are created once
    /// here and live until process shutdown; enablement is separate and
    /// starts out off for both destinations.
    pub fn new(registry: Arc<CounterRegistry>) -> Self {
        let standard = GaugeSet::new(Destination::Standard, Self::standard_gauges());
        let live = GaugeSet::new(Destination::Live, Self::live_gauges());

        Self {
            registry,
            standard,
            live,
            standard_last_tick: Mutex::new(None),
            live_last_tick: Mutex::new(None),
        }
    }

    fn standard_gauges() -> Vec<Gauge> {
        vec![
            Gauge::new(GaugeId::PrivateBytes, |s| {
                Ok(s.process.private_bytes as f64)
            }),
            Gauge::new(GaugeId::AvailableBytes, |s| {
                Ok(s.process.available_bytes as f64)
            }),
            Gauge::new(GaugeId::ProcessorTime, |s| Ok(s.process.processor_time_pct)),
            Gauge::new(GaugeId::ProcessTime, |s| Ok(s.process.process_time_pct)),
            Gauge::new(GaugeId::RequestRate, |s| {
                Ok(s.window.requests.rate_per_second(s.elapsed_secs))
            }),
            Gauge::new(GaugeId::RequestDuration, |s| {
                Ok(s.window.requests.average_duration_ms())
            }),
        ]
    }

    fn live_gauges() -> Vec<Gauge> {
        vec![
            Gauge::new(GaugeId::CommittedBytes, |s| {
                Ok(s.process.private_bytes as f64)
            }),
            Gauge::new(GaugeId::RequestFailureRate, |s| {
                Ok(s.window.requests.failure_rate_per_second(s.elapsed_secs))
            }),
            Gauge::new(GaugeId::DependencyRate, |s| {
                Ok(s.window.dependencies.rate_per_second(s.elapsed_secs))
            }),
            Gauge::new(GaugeId::DependencyFailureRate, |s| {
                Ok(s.window.dependencies.failure_rate_per_second(s.elapsed_secs))
            }),
            Gauge::new(GaugeId::DependencyDuration, |s| {
                Ok(s.window.dependencies.average_duration_ms())
            }),
            Gauge::new(GaugeId::ExceptionRate, |s| {
                if s.elapsed_secs <= 0.0 {
                    return Ok(0.0);
                }
                Ok(s.window.exception_count as f64 / s.elapsed_secs)
            }),
        ]
    }

    fn gauge_set(&self, destination: Destination) -> &GaugeSet {
        match destination {
            Destination::Standard => &self.standard,
            Destination::Live => &self.live,
        }
    }

    fn last_tick(&self, destination: Destination) -> &Mutex<Option<Instant>> {
        match destination {
            Destination::Standard => &self.standard_last_tick,
            Destination::Live => &self.live_last_tick,
        }
    }

    /// The counter registry feeding this collector.
    pub fn registry(&self) -> &Arc<CounterRegistry> {
        &self.registry
    }

    /// Number of gauges bound to a destination. Fixed at construction.
    pub fn gauge_count(&self, destination: Destination) -> usize {
        self.gauge_set(destination).len()
    }

    /// Whether a destination is currently collecting.
    pub fn is_enabled(&self, destination: Destination) -> bool {
        self.gauge_set(destination).is_enabled()
    }

    /// Enable or disable one destination's gauge set. Idempotent in both
    /// directions; disabling stops future ticks from producing points but
    /// never retracts already-exported ones.
    ///
    /// On a disabled-to-enabled transition the destination's window is
    /// reset, so the first tick reports only activity that happened after
    /// enablement (zero activity reads as zero, never an error).
    pub fn set_enabled(&self, destination: Destination, enabled: bool) {
        let changed = self.gauge_set(destination).set_enabled(enabled);
        if !changed {
            return;
        }

        debug!(destination = %destination, enabled, "performance gauge set toggled");
        if enabled {
            // Discard anything accumulated while disabled and restart the
            // elapsed window from the enable point.
            self.registry.drain(destination);
            *self.last_tick(destination).lock() = Some(Instant::now());
        }
    }

    /// Run one collection tick for a destination.
    ///
    /// Takes a consistent snapshot-and-reset of the destination's window,
    /// then derives every gauge from that one sample. A disabled
    /// destination contributes no points and leaves its window untouched.
    pub fn collect(&self, destination: Destination) -> TickOutcome {
        let set = self.gauge_set(destination);
        if !set.is_enabled() {
            return TickOutcome::default();
        }

        self.registry.refresh_process_snapshot();

        let now = Instant::now();
        let elapsed_secs = {
            let mut last = self.last_tick(destination).lock();
            let elapsed = last.map(|t| (now - t).as_secs_f64()).unwrap_or(0.0);
            *last = Some(now);
            elapsed
        };

        let sample = TickSample {
            elapsed_secs,
            process: self.registry.process_snapshot(),
            window: self.registry.drain(destination),
        };

        let outcome = set.collect(&sample);
        debug!(
            destination = %destination,
            points = outcome.points.len(),
            errors = outcome.errors.len(),
            "performance tick collected"
        );
        outcome
    }
}

// =============================================================================
// Tests
// =============================================================================
