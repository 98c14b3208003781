//! Gauges and gauge sets
//!
//! A gauge is a named instrument whose value is computed at read time from
//! a consistent tick sample (drained accumulators plus the instantaneous
//! process snapshot). Gauges are grouped into one ordered set per export
//! destination; a disabled set yields no data points at all, which is
//! distinct from a set of zero-valued points.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::counters::registry::{Destination, ProcessSnapshot, WindowSample};
use crate::error::Error;

// =============================================================================
// Gauge Identity
// =============================================================================

/// Enumerated gauge names.
///
/// The standard and live destinations use distinct identities even where
/// the semantics overlap (e.g. `PrivateBytes` vs `CommittedBytes`), so a
/// point's name alone determines its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GaugeId {
    // Standard destination
    PrivateBytes,
    AvailableBytes,
    ProcessorTime,
    ProcessTime,
    RequestRate,
    RequestDuration,
    // Live destination
    CommittedBytes,
    RequestFailureRate,
    DependencyRate,
    DependencyFailureRate,
    DependencyDuration,
    ExceptionRate,
}

impl GaugeId {
    /// Stable wire name for the instrument.
    pub fn as_str(&self) -> &'static str {
        match self {
            GaugeId::PrivateBytes => "process_private_bytes",
            GaugeId::AvailableBytes => "host_available_bytes",
            GaugeId::ProcessorTime => "host_processor_time",
            GaugeId::ProcessTime => "process_processor_time",
            GaugeId::RequestRate => "request_rate",
            GaugeId::RequestDuration => "request_duration",
            GaugeId::CommittedBytes => "live_committed_bytes",
            GaugeId::RequestFailureRate => "live_request_failure_rate",
            GaugeId::DependencyRate => "live_dependency_rate",
            GaugeId::DependencyFailureRate => "live_dependency_failure_rate",
            GaugeId::DependencyDuration => "live_dependency_duration",
            GaugeId::ExceptionRate => "live_exception_rate",
        }
    }
}

impl std::fmt::Display for GaugeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Tick Sample
// =============================================================================

/// Consistent inputs for one collection tick of one destination.
///
/// Built once per tick (snapshot-and-reset), then handed read-only to every
/// gauge in the set, so all gauges observe the same window.
#[derive(Debug, Clone, Copy)]
pub struct TickSample {
    /// Seconds since the destination's previous tick
    pub elapsed_secs: f64,
    /// Latest instantaneous process readings
    pub process: ProcessSnapshot,
    /// Accumulators drained for this destination
    pub window: WindowSample,
}

// =============================================================================
// Data Point
// =============================================================================

/// One exported metric observation.
#[derive(Debug, Clone, Serialize)]
pub struct DataPoint {
    /// Instrument name
    pub name: &'static str,
    /// Observed value
    pub value: f64,
    /// When the observation was taken
    pub timestamp: DateTime<Utc>,
    /// Dimension key/value pairs, empty for plain gauges
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl DataPoint {
    pub fn new(id: GaugeId, value: f64) -> Self {
        Self::named(id.as_str(), value)
    }

    /// Build a point for an instrument outside the gauge id enum
    /// (pre-aggregated standard metrics, heartbeat).
    pub fn named(name: &'static str, value: f64) -> Self {
        Self {
            name,
            value,
            timestamp: Utc::now(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Gauge
// =============================================================================

type ReadFn = Box<dyn Fn(&TickSample) -> Result<f64, Error> + Send + Sync>;

/// A named instrument bound to a read function.
///
/// Created once at collector construction and never destroyed before
/// process shutdown.
pub struct Gauge {
    id: GaugeId,
    read: ReadFn,
}

impl Gauge {
    pub fn new(
        id: GaugeId,
        read: impl Fn(&TickSample) -> Result<f64, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            read: Box::new(read),
        }
    }

    pub fn id(&self) -> GaugeId {
        self.id
    }

    /// Read the gauge against a tick sample.
    pub fn observe(&self, sample: &TickSample) -> Result<f64, Error> {
        (self.read)(sample)
    }
}

// =============================================================================
// Gauge Set
// =============================================================================

/// Result of collecting one gauge set for one tick.
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// One point per gauge that read successfully
    pub points: Vec<DataPoint>,
    /// Read failures; a failing gauge never aborts the tick
    pub errors: Vec<Error>,
}

/// Ordered collection of gauges bound to one export destination.
pub struct GaugeSet {
    destination: Destination,
    enabled: AtomicBool,
    gauges: Vec<Gauge>,
}

impl GaugeSet {
    pub fn new(destination: Destination, gauges: Vec<Gauge>) -> Self {
        Self {
            destination,
            enabled: AtomicBool::new(false),
            gauges,
        }
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Flip enablement; idempotent in both directions. Returns whether the
    /// state changed. Only the owning collector calls this.
    pub(crate) fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel) != enabled
    }

    pub fn len(&self) -> usize {
        self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }

    /// Produce one data point per enabled gauge from the tick sample.
    ///
    /// A disabled set contributes nothing; a gauge read failure is recorded
    /// in the outcome's error list while the remaining gauges still emit.
    pub fn collect(&self, sample: &TickSample) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if !self.is_enabled() {
            return outcome;
        }

        for gauge in &self.gauges {
            match gauge.observe(sample) {
                Ok(value) => outcome.points.push(DataPoint::new(gauge.id(), value)),
                Err(e) => outcome.errors.push(e),
            }
        }
        outcome
    }
}

// =============================================================================
// Tests
// =============================================================================
