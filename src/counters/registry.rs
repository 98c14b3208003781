//! Counter Registry
//!
//! Lock-free process-wide counter state shared between many concurrent
//! producer callbacks (instrumentation interceptors, the span bridge) and
//! the periodic collection ticks. Rate/duration accumulators are kept once
//! per export destination so that draining one destination's window never
//! erases data the other destination has not yet consumed. Instantaneous
//! gauge fields (memory, CPU) are a single shared snapshot refreshed by a
//! direct OS query, never accumulated.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use sysinfo::{get_current_pid, Pid, ProcessesToUpdate, System};
use tracing::warn;

// =============================================================================
// Destinations
// =============================================================================

/// Export destination for a collection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Low-frequency, durable export channel
    Standard,
    /// High-frequency, low-latency channel for near-real-time views
    Live,
}

impl Destination {
    /// Both destinations, in collection order.
    pub const ALL: [Destination; 2] = [Destination::Standard, Destination::Live];
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Standard => write!(f, "standard"),
            Destination::Live => write!(f, "live"),
        }
    }
}

/// Kind of completed operation recorded against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// Inbound request handled by this process
    Request,
    /// Outbound dependency call made by this process
    Dependency,
}

// =============================================================================
// Accumulators
// =============================================================================

/// Sum/count/failure triple for one rate-style counter.
///
/// Durations are accumulated in microseconds to keep the hot path integer.
#[derive(Default)]
struct RateAccumulator {
    duration_sum_us: AtomicU64,
    count: AtomicU64,
    failure_count: AtomicU64,
}

impl RateAccumulator {
    fn record(&self, duration_ms: f64, success: bool) {
        self.duration_sum_us
            .fetch_add((duration_ms * 1_000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Atomically read and reset.
    fn drain(&self) -> WindowStats {
        WindowStats {
            duration_sum_ms: self.duration_sum_us.swap(0, Ordering::Relaxed) as f64 / 1_000.0,
            count: self.count.swap(0, Ordering::Relaxed),
            failure_count: self.failure_count.swap(0, Ordering::Relaxed),
        }
    }
}

/// One destination's set of drainable accumulators.
#[derive(Default)]
struct DestinationAccumulators {
    requests: RateAccumulator,
    dependencies: RateAccumulator,
    exception_count: AtomicU64,
}

// =============================================================================
// Drained Window
// =============================================================================

/// Stats drained from one rate accumulator for one collection window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    /// Total duration of completed operations in the window
    pub duration_sum_ms: f64,
    /// Number of completed operations
    pub count: u64,
    /// Number of failed operations
    pub failure_count: u64,
}

impl WindowStats {
    /// Average duration over the window; 0 when nothing completed.
    pub fn average_duration_ms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.duration_sum_ms / self.count as f64
    }

    /// Completions per second over the given elapsed window; 0 when the
    /// window is empty.
    pub fn rate_per_second(&self, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.count as f64 / elapsed_secs
    }

    /// Failures per second over the given elapsed window.
    pub fn failure_rate_per_second(&self, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.failure_count as f64 / elapsed_secs
    }
}

/// Everything drained from one destination in a single tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowSample {
    pub requests: WindowStats,
    pub dependencies: WindowStats,
    pub exception_count: u64,
}

// =============================================================================
// Process Snapshot
// =============================================================================

/// Instantaneous process/host readings, refreshed by direct OS query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessSnapshot {
    /// Committed process memory in bytes
    pub private_bytes: u64,
    /// Available host memory in bytes
    pub available_bytes: u64,
    /// Host-wide CPU utilization, percent
    pub processor_time_pct: f64,
    /// This process's CPU utilization, percent
    pub process_time_pct: f64,
}

/// Source of instantaneous process readings.
///
/// Abstracted so collection ticks can be tested without touching the OS.
pub trait ProcessProbe: Send {
    /// Take a fresh reading.
    fn snapshot(&mut self) -> ProcessSnapshot;
}

/// [`ProcessProbe`] backed by `sysinfo`.
pub struct SysinfoProbe {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        let pid = match get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("Cannot resolve current pid, process CPU/memory unavailable: {e}");
                None
            }
        };
        Self { system, pid }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for SysinfoProbe {
    fn snapshot(&mut self) -> ProcessSnapshot {
        self.system.refresh_memory();
        self.system.refresh_cpu_all();

        let (private_bytes, process_time_pct) = match self.pid {
            Some(pid) => {
                self.system
                    .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                match self.system.process(pid) {
                    Some(process) => (process.memory(), process.cpu_usage() as f64),
                    None => (0, 0.0),
                }
            }
            None => (0, 0.0),
        };

        ProcessSnapshot {
            private_bytes,
            available_bytes: self.system.available_memory(),
            processor_time_pct: self.system.global_cpu_usage() as f64,
            process_time_pct,
        }
    }
}

// =============================================================================
// Counter Registry
// =============================================================================

/// Shared counter state between producers and the collection ticks.
///
/// Producers only ever increment (lock-free); each destination's tick is
/// the single consumer of its own accumulators and drains them with an
/// atomic swap, so a tick never blocks producers and never holds a lock
/// across derived-value computation.
pub struct CounterRegistry {
    standard: DestinationAccumulators,
    live: DestinationAccumulators,
    probe: Mutex<Box<dyn ProcessProbe>>,
    snapshot: RwLock<ProcessSnapshot>,
}

impl CounterRegistry {
    /// Create a registry reading real process stats from the OS.
    pub fn new() -> Self {
        Self::with_probe(Box::new(SysinfoProbe::new()))
    }

    /// Create a registry with a custom process probe.
    pub fn with_probe(probe: Box<dyn ProcessProbe>) -> Self {
        Self {
            standard: DestinationAccumulators::default(),
            live: DestinationAccumulators::default(),
            probe: Mutex::new(probe),
            snapshot: RwLock::new(ProcessSnapshot::default()),
        }
    }

    fn accumulators(&self, destination: Destination) -> &DestinationAccumulators {
        match destination {
            Destination::Standard => &self.standard,
            Destination::Live => &self.live,
        }
    }

    /// Record a completed operation. Applied to both destinations'
    /// accumulators so each keeps an independent window.
    pub fn record(&self, kind: CompletionKind, duration_ms: f64, success: bool) {
        for destination in Destination::ALL {
            let acc = self.accumulators(destination);
            match kind {
                CompletionKind::Request => acc.requests.record(duration_ms, success),
                CompletionKind::Dependency => acc.dependencies.record(duration_ms, success),
            }
        }
    }

    /// Record a completed inbound request.
    pub fn record_request(&self, duration_ms: f64, success: bool) {
        self.record(CompletionKind::Request, duration_ms, success);
    }

    /// Record a completed outbound dependency call.
    pub fn record_dependency(&self, duration_ms: f64, success: bool) {
        self.record(CompletionKind::Dependency, duration_ms, success);
    }

    /// Record a tracked exception.
    pub fn record_exception(&self) {
        for destination in Destination::ALL {
            self.accumulators(destination)
                .exception_count
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Atomically read-and-reset one destination's accumulators.
    ///
    /// Instantaneous fields are untouched; use
    /// [`refresh_process_snapshot`](Self::refresh_process_snapshot) for those.
    pub fn drain(&self, destination: Destination) -> WindowSample {
        let acc = self.accumulators(destination);
        WindowSample {
            requests: acc.requests.drain(),
            dependencies: acc.dependencies.drain(),
            exception_count: acc.exception_count.swap(0, Ordering::Relaxed),
        }
    }

    /// Take a fresh OS reading and publish it as the shared snapshot.
    pub fn refresh_process_snapshot(&self) {
        let fresh = self.probe.lock().snapshot();
        *self.snapshot.write() = fresh;
    }

    /// Latest published process snapshot.
    pub fn process_snapshot(&self) -> ProcessSnapshot {
        *self.snapshot.read()
    }
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
