//! Metric Handler
//!
//! Orchestrates the metric side of the pipeline: owns the counter
//! registry, the dual-destination performance collector, the standard
//! pre-aggregated metrics handler, the heartbeat handler, and the periodic
//! export readers that ship each source on its destination's schedule.
//! Sub-handlers are constructed exactly once here; `start()` only enables
//! and spawns, so calling it twice never duplicates instruments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::config::PipelineConfig;
use crate::counters::{CounterRegistry, Destination};
use crate::error::Result;
use crate::export::MetricsExporter;
use crate::metrics::heartbeat::HeartbeatHandler;
use crate::metrics::reader::PeriodicReader;
use crate::metrics::standard::StandardMetricsHandler;
use crate::perf::PerformanceCollector;
use crate::traces::HttpPerfInstrumentation;

/// Owner of metric collection and export lifecycle.
pub struct MetricHandler {
    config: PipelineConfig,
    registry: Arc<CounterRegistry>,
    collector: Arc<PerformanceCollector>,
    standard_metrics: Option<Arc<StandardMetricsHandler>>,
    heartbeat: Option<Arc<HeartbeatHandler>>,
    perf_http: Option<Arc<HttpPerfInstrumentation>>,
    standard_exporter: Arc<dyn MetricsExporter>,
    live_exporter: Option<Arc<dyn MetricsExporter>>,
    readers: Mutex<Vec<PeriodicReader>>,
    started: AtomicBool,
    shut_down: AtomicBool,
}

impl MetricHandler {
    /// Construct the handler and all sub-handlers. Fails fast on invalid
    /// configuration. A live exporter is only consulted when live metrics
    /// are enabled in the configuration.
    pub fn new(
        config: PipelineConfig,
        standard_exporter: Arc<dyn MetricsExporter>,
        live_exporter: Option<Arc<dyn MetricsExporter>>,
    ) -> Result<Self> {
        config.validate()?;
        Self::with_registry(
            config,
            Arc::new(CounterRegistry::new()),
            standard_exporter,
            live_exporter,
        )
    }

    /// Construct with an explicit registry (custom process probe).
    pub fn with_registry(
        config: PipelineConfig,
        registry: Arc<CounterRegistry>,
        standard_exporter: Arc<dyn MetricsExporter>,
        live_exporter: Option<Arc<dyn MetricsExporter>>,
    ) -> Result<Self> {
        config.validate()?;

        let collector = Arc::new(PerformanceCollector::new(registry.clone()));

        let standard_metrics = config
            .standard_metrics_enabled
            .then(|| Arc::new(StandardMetricsHandler::new()));
        let heartbeat = config
            .heartbeat_enabled
            .then(|| Arc::new(HeartbeatHandler::new()));
        // Explicit disabled sentinel: None when perf counters are
        // configured off, so callers check presence instead of calling
        // into a no-op.
        let perf_http = config
            .performance_counters_enabled
            .then(|| Arc::new(HttpPerfInstrumentation::new(registry.clone())));

        Ok(Self {
            config,
            registry,
            collector,
            standard_metrics,
            heartbeat,
            perf_http,
            standard_exporter,
            live_exporter,
            readers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        })
    }

    fn live_configured(&self) -> bool {
        self.config.live_metrics_enabled && self.live_exporter.is_some()
    }

    /// Start collection and export. Idempotent: a second call changes
    /// nothing, registers nothing twice, and spawns no extra readers.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            debug!("metric handler already started");
            return;
        }

        // Performance collection is unconditional for the standard set;
        // the live set is gated on a configured live destination.
        self.collector.set_enabled(Destination::Standard, true);
        if self.live_configured() {
            self.collector.set_enabled(Destination::Live, true);
        }

        let mut readers = self.readers.lock();

        let collector = self.collector.clone();
        readers.push(PeriodicReader::spawn(
            "perf-standard",
            self.config.standard_tick_interval,
            Box::new(move || collector.collect(Destination::Standard)),
            self.standard_exporter.clone(),
        ));

        if let Some(live_exporter) = self.live_exporter.as_ref().filter(|_| self.live_configured())
        {
            let collector = self.collector.clone();
            readers.push(PeriodicReader::spawn(
                "perf-live",
                self.config.live_tick_interval,
                Box::new(move || collector.collect(Destination::Live)),
                live_exporter.clone(),
            ));
        }

        if let Some(standard_metrics) = &self.standard_metrics {
            let handler = standard_metrics.clone();
            readers.push(PeriodicReader::spawn(
                "standard-metrics",
                self.config.standard_tick_interval,
                Box::new(move || handler.collect()),
                self.standard_exporter.clone(),
            ));
        }

        if let Some(heartbeat) = &self.heartbeat {
            let handler = heartbeat.clone();
            readers.push(PeriodicReader::spawn(
                "heartbeat",
                self.config.heartbeat_interval,
                Box::new(move || handler.collect()),
                self.standard_exporter.clone(),
            ));
        }

        info!(
            readers = readers.len(),
            live = self.live_configured(),
            "metric handler started"
        );
    }

    /// HTTP instrumentation pre-wired to the counter registry, or `None`
    /// when performance counters are configured off. This is the seam the
    /// trace handler consumes.
    pub fn perf_counter_instrumentation(&self) -> Option<Arc<HttpPerfInstrumentation>> {
        self.perf_http.clone()
    }

    /// Record a completed inbound request across all metric sources.
    pub fn record_request(&self, duration_ms: f64, success: bool) {
        self.registry.record_request(duration_ms, success);
        if let Some(standard) = &self.standard_metrics {
            standard.record_request(duration_ms, success);
        }
    }

    /// Record a completed outbound dependency call.
    pub fn record_dependency(&self, duration_ms: f64, success: bool) {
        self.registry.record_dependency(duration_ms, success);
        if let Some(standard) = &self.standard_metrics {
            standard.record_dependency(duration_ms, success);
        }
    }

    /// Record a tracked exception (feeds the live exception rate).
    pub fn record_exception(&self) {
        self.registry.record_exception();
    }

    /// Total instruments registered across sub-handlers. Fixed at
    /// construction; unchanged by repeated `start()` calls.
    pub fn instrument_count(&self) -> usize {
        let mut count = self.collector.gauge_count(Destination::Standard)
            + self.collector.gauge_count(Destination::Live);
        if let Some(standard) = &self.standard_metrics {
            count += standard.instrument_count();
        }
        if let Some(heartbeat) = &self.heartbeat {
            count += heartbeat.instrument_count();
        }
        count
    }

    pub fn registry(&self) -> &Arc<CounterRegistry> {
        &self.registry
    }

    pub fn collector(&self) -> &Arc<PerformanceCollector> {
        &self.collector
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Stop collection and export. Each reader runs one final tick before
    /// exiting so the tail of every window is shipped. Idempotent.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let readers = std::mem::take(&mut *self.readers.lock());
        for reader in readers {
            debug!(reader = reader.name(), "stopping export reader");
            reader.stop().await;
        }

        self.collector.set_enabled(Destination::Standard, false);
        self.collector.set_enabled(Destination::Live, false);
        info!("metric handler shut down");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
