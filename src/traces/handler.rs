//! Trace Handler
//!
//! Orchestrates the trace side of the pipeline: the sampler, the span
//! processor chain, and the instrumentation lifecycle. Finished spans flow
//! sampler -> processors in chain order; the batching processor runs first
//! and the perf counter bridge after it, so a span always reaches durable
//! export before it influences derived gauges.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::export::SpanExporter;
use crate::metrics::MetricHandler;
use crate::traces::batch::BatchSpanProcessor;
use crate::traces::bridge::PerfBridgeProcessor;
use crate::traces::instrumentation::{
    Instrumentation, InstrumentationKind, InstrumentationRegistry, LibraryInstrumentation,
};
use crate::traces::sampler::Sampler;
use crate::traces::span::{SpanData, SpanProcessor};

/// Hook released on shutdown, for callers that patch into a host runtime
/// and need to undo the patch when the pipeline stops.
pub trait InvocationHook: Send + Sync {
    fn shutdown(&self);
}

// =============================================================================
// Pipeline
// =============================================================================

/// Sampling decision plus the ordered span processor chain.
pub struct TracePipeline {
    sampler: Sampler,
    processors: Vec<Arc<dyn SpanProcessor>>,
}

impl TracePipeline {
    pub fn new(sampler: Sampler, processors: Vec<Arc<dyn SpanProcessor>>) -> Self {
        Self {
            sampler,
            processors,
        }
    }

    /// Submit a finished span. Sampled-out spans touch no processor, so a
    /// trace is kept or discarded wholesale by its trace id.
    pub fn finish_span(&self, span: SpanData) {
        if !self.sampler.should_sample(&span.trace_id) {
            return;
        }
        for processor in &self.processors {
            processor.on_end(&span);
        }
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Flush every processor in chain order, reporting the first failure
    /// after giving each a chance to flush.
    pub async fn force_flush(&self) -> Result<()> {
        let mut first_err = None;
        for processor in &self.processors {
            if let Err(e) = processor.force_flush().await {
                warn!(%e, "span processor flush failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        for processor in &self.processors {
            processor.shutdown().await?;
        }
        Ok(())
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Owner of trace collection, sampling, batching and instrumentation
/// lifecycle.
pub struct TraceHandler {
    config: PipelineConfig,
    pipeline: Arc<TracePipeline>,
    batch: Arc<BatchSpanProcessor>,
    instrumentations: InstrumentationRegistry,
    metric_handler: Option<Arc<MetricHandler>>,
    hook: Mutex<Option<Arc<dyn InvocationHook>>>,
    started: AtomicBool,
    shut_down: AtomicBool,
}

impl TraceHandler {
    /// Build the processor chain and sampler. Fails fast on invalid
    /// configuration. When a metric handler is provided, a bridge processor
    /// feeds span outcomes into its counter registry. Must be called from
    /// within a tokio runtime.
    pub fn new(
        config: PipelineConfig,
        span_exporter: Arc<dyn SpanExporter>,
        metric_handler: Option<Arc<MetricHandler>>,
    ) -> Result<Self> {
        config.validate()?;
        let sampler = Sampler::new(config.sampling_ratio)?;

        let batch = Arc::new(BatchSpanProcessor::new(
            span_exporter,
            config.batch.clone(),
        )?);

        let mut processors: Vec<Arc<dyn SpanProcessor>> = vec![batch.clone()];
        if let Some(handler) = &metric_handler {
            processors.push(Arc::new(PerfBridgeProcessor::new(handler.registry().clone())));
        }

        Ok(Self {
            config,
            pipeline: Arc::new(TracePipeline::new(sampler, processors)),
            batch,
            instrumentations: InstrumentationRegistry::new(),
            metric_handler,
            hook: Mutex::new(None),
            started: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Register built-in instrumentations per configuration and enable
    /// everything registered so far. Idempotent: a second call registers
    /// nothing new and enablement is already in force.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            debug!("trace handler already started");
            return;
        }

        if let Some(perf_http) = self
            .metric_handler
            .as_ref()
            .and_then(|h| h.perf_counter_instrumentation())
        {
            self.instrumentations.register(perf_http);
        }

        let opts = &self.config.instrumentations;
        if opts.http {
            self.instrumentations
                .register(Arc::new(LibraryInstrumentation::new(
                    InstrumentationKind::Http,
                )));
        }
        if opts.sql {
            self.instrumentations
                .register(Arc::new(LibraryInstrumentation::new(
                    InstrumentationKind::Sql,
                )));
        }
        if opts.nosql {
            self.instrumentations
                .register(Arc::new(LibraryInstrumentation::new(
                    InstrumentationKind::NoSql,
                )));
        }
        if opts.sdk {
            self.instrumentations
                .register(Arc::new(LibraryInstrumentation::new(
                    InstrumentationKind::Sdk,
                )));
        }

        self.instrumentations.enable_all();
        info!(
            instrumentations = self.instrumentations.len(),
            processors = self.pipeline.processor_count(),
            "trace handler started"
        );
    }

    /// Add an externally built instrumentation. If one of the same kind is
    /// already registered this is a no-op returning the existing instance.
    /// Added after `start()`, the instrumentation is enabled immediately.
    pub fn add_instrumentation(
        &self,
        instrumentation: Arc<dyn Instrumentation>,
    ) -> Arc<dyn Instrumentation> {
        let registered = self.instrumentations.register(instrumentation);
        if self.started.load(Ordering::Acquire) && !self.shut_down.load(Ordering::Acquire) {
            registered.enable();
        }
        registered
    }

    /// Disable all registered instrumentations without unregistering them.
    /// There is no bulk re-enable short of restarting the pipeline.
    pub fn disable_instrumentations(&self) {
        self.instrumentations.disable_all();
    }

    /// Submit a finished span to the pipeline.
    pub fn finish_span(&self, span: SpanData) {
        self.pipeline.finish_span(span);
    }

    /// Install the shutdown hook, replacing any previous one.
    pub fn set_invocation_hook(&self, hook: Arc<dyn InvocationHook>) {
        *self.hook.lock() = Some(hook);
    }

    pub fn instrumentations(&self) -> &InstrumentationRegistry {
        &self.instrumentations
    }

    pub fn pipeline(&self) -> &Arc<TracePipeline> {
        &self.pipeline
    }

    pub fn dropped_span_count(&self) -> u64 {
        self.batch.dropped_count()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Flush buffered spans. Resolves within the export timeout even if the
    /// exporter hangs.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<()> {
        self.pipeline.force_flush().await
    }

    /// Stop the trace side in order: disable instrumentations so no new
    /// spans arrive, flush what is buffered, shut the processors down, then
    /// release the invocation hook. Idempotent.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.instrumentations.disable_all();

        if let Err(e) = self.pipeline.force_flush().await {
            warn!(%e, "flush during shutdown failed, proceeding");
        }
        self.pipeline.shutdown().await?;

        if let Some(hook) = self.hook.lock().take() {
            hook.shutdown();
        }

        info!("trace handler shut down");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
