//! Instrumentation registry
//!
//! Instrumentation libraries intercept HTTP/DB calls and emit spans; the
//! pipeline only manages their lifecycle. Identity is the instrumentation
//! kind: at most one live instance per kind is ever registered, and
//! registering a duplicate is a no-op returning the existing instance.
//! Registration and enablement are separate phases: an instrumentation is
//! registered-but-disabled until the trace handler's `start()` enables it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::counters::CounterRegistry;

// =============================================================================
// Identity
// =============================================================================

/// Kind of instrumentation; registry identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentationKind {
    /// HTTP client/server interception
    Http,
    /// SQL database drivers
    Sql,
    /// NoSQL database drivers
    NoSql,
    /// Cloud SDK calls
    Sdk,
    /// HTTP interception routed into the performance counter registry
    HttpMetrics,
}

impl InstrumentationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentationKind::Http => "http",
            InstrumentationKind::Sql => "sql",
            InstrumentationKind::NoSql => "nosql",
            InstrumentationKind::Sdk => "sdk",
            InstrumentationKind::HttpMetrics => "http-metrics",
        }
    }
}

impl std::fmt::Display for InstrumentationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Port
// =============================================================================

/// Lifecycle surface the pipeline needs from an instrumentation.
///
/// The interception mechanics belong to the collaborator; the pipeline
/// registers, enables and disables.
pub trait Instrumentation: Send + Sync {
    fn kind(&self) -> InstrumentationKind;

    /// Begin intercepting. Idempotent.
    fn enable(&self);

    /// Stop intercepting without unregistering. Idempotent.
    fn disable(&self);

    fn is_enabled(&self) -> bool;
}

// =============================================================================
// Library Handle
// =============================================================================

/// Handle to an external interception library.
///
/// Stands in for third-party instrumentation whose mechanics are out of
/// scope; the pipeline only drives the enable/disable protocol.
pub struct LibraryInstrumentation {
    kind: InstrumentationKind,
    enabled: AtomicBool,
}

impl LibraryInstrumentation {
    pub fn new(kind: InstrumentationKind) -> Self {
        Self {
            kind,
            enabled: AtomicBool::new(false),
        }
    }
}

impl Instrumentation for LibraryInstrumentation {
    fn kind(&self) -> InstrumentationKind {
        self.kind
    }

    fn enable(&self) {
        if !self.enabled.swap(true, Ordering::AcqRel) {
            debug!(kind = %self.kind, "instrumentation enabled");
        }
    }

    fn disable(&self) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            debug!(kind = %self.kind, "instrumentation disabled");
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

// =============================================================================
// Perf Counter HTTP Instrumentation
// =============================================================================

/// HTTP instrumentation pre-wired to the counter registry.
///
/// Built by the metric handler when performance counters are configured on
/// (callers get an explicit `None` otherwise) and handed to the trace
/// handler for lifecycle management. Completion callbacks are gated on the
/// enablement flag, so a disabled instance records nothing.
pub struct HttpPerfInstrumentation {
    registry: Arc<CounterRegistry>,
    enabled: AtomicBool,
}

impl HttpPerfInstrumentation {
    pub fn new(registry: Arc<CounterRegistry>) -> Self {
        Self {
            registry,
            enabled: AtomicBool::new(false),
        }
    }

    /// Callback for a completed inbound request.
    pub fn on_request_completed(&self, duration_ms: f64, success: bool) {
        if self.is_enabled() {
            self.registry.record_request(duration_ms, success);
        }
    }

    /// Callback for a completed outbound dependency call.
    pub fn on_dependency_completed(&self, duration_ms: f64, success: bool) {
        if self.is_enabled() {
            self.registry.record_dependency(duration_ms, success);
        }
    }
}

impl Instrumentation for HttpPerfInstrumentation {
    fn kind(&self) -> InstrumentationKind {
        InstrumentationKind::HttpMetrics
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Tracks registered instrumentations, one live instance per kind.
pub struct InstrumentationRegistry {
    entries: DashMap<InstrumentationKind, Arc<dyn Instrumentation>>,
    /// Registration order, for deterministic enable sweeps
    order: Mutex<Vec<InstrumentationKind>>,
}

impl InstrumentationRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Register an instrumentation. If its kind is already present this is
    /// a no-op returning the existing instance, not an error.
    pub fn register(&self, instrumentation: Arc<dyn Instrumentation>) -> Arc<dyn Instrumentation> {
        let kind = instrumentation.kind();
        if let Some(existing) = self.entries.get(&kind) {
            debug!(kind = %kind, "instrumentation already registered, keeping existing");
            return existing.clone();
        }
        self.entries.insert(kind, instrumentation.clone());
        self.order.lock().push(kind);
        instrumentation
    }

    pub fn contains(&self, kind: InstrumentationKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn get(&self, kind: InstrumentationKind) -> Option<Arc<dyn Instrumentation>> {
        self.entries.get(&kind).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered instrumentations in registration order.
    pub fn list(&self) -> Vec<Arc<dyn Instrumentation>> {
        self.order
            .lock()
            .iter()
            .filter_map(|kind| self.get(*kind))
            .collect()
    }

    /// Enable everything currently on the list.
    pub fn enable_all(&self) {
        for instrumentation in self.list() {
            instrumentation.enable();
        }
    }

    /// Disable everything without unregistering.
    pub fn disable_all(&self) {
        for instrumentation in self.list() {
            instrumentation.disable();
        }
    }
}

impl Default for InstrumentationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
