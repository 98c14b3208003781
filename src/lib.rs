//! Pulsemetry - Telemetry Aggregation and Export Pipeline
//!
//! An in-process pipeline that aggregates application telemetry and ships
//! it to two destinations on independent schedules: a standard backend on
//! a slow tick and a live diagnostics stream on a fast tick. Performance
//! counters are derived from process probes and request/dependency
//! completions; traces are sampled deterministically, batched, and
//! exported in the background.
//!
//! # Architecture
//!
//! The pipeline follows a two-handler layout with a shared counter core:
//!
//! ```text
//! Instrumentations → Trace Handler → Batch Processor → Span Exporter
//!                          │
//!                   Perf Bridge
//!                          ↓
//!                  Counter Registry → Metric Handler → Metric Exporters
//!                  (standard + live)      (readers)    (standard / live)
//! ```
//!
//! # Features
//!
//! - Dual-destination performance counters (independent drain windows)
//! - Pre-aggregated standard request/dependency metrics
//! - Periodic heartbeat with static runtime properties
//! - Deterministic trace-id keyed sampling
//! - Bounded, non-blocking batch span export
//! - Instrumentation lifecycle with one live instance per kind
//!
//! # Modules
//!
//! - [`config`] - Pipeline, batching and instrumentation configuration
//! - [`counters`] - Counter registry, gauges and process probes
//! - [`error`] - Error types
//! - [`export`] - Exporter ports and export outcomes
//! - [`metrics`] - Metric handler, standard metrics, heartbeat, readers
//! - [`perf`] - Dual-destination performance collector
//! - [`traces`] - Trace handler, sampler, batch processor, instrumentations

pub mod config;
pub mod counters;
pub mod error;
pub mod export;
pub mod metrics;
pub mod perf;
pub mod traces;

// Re-export commonly used types
pub use config::{BatchConfig, InstrumentationOptions, PipelineConfig};
pub use counters::{CounterRegistry, DataPoint, Destination};
pub use error::{Error, Result};
pub use export::{ExportOutcome, MetricsExporter, SpanExporter};
pub use metrics::MetricHandler;
pub use perf::PerformanceCollector;
pub use traces::{SpanData, SpanKind, TraceHandler};
