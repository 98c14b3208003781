//! Pipeline Integration Tests
//!
//! End-to-end tests across both handlers:
//! - Performance counter collection and dual-destination windows
//! - Metric handler lifecycle and export scheduling
//! - Trace handler lifecycle, sampling, batching and shutdown ordering

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use uuid::Uuid;

use pulsemetry::counters::{ProcessProbe, ProcessSnapshot};
use pulsemetry::traces::{InstrumentationKind, LibraryInstrumentation};
use pulsemetry::{
    CounterRegistry, DataPoint, ExportOutcome, MetricHandler, MetricsExporter,
    PipelineConfig, SpanData, SpanExporter, SpanKind, TraceHandler,
};

// =============================================================================
// Test doubles
// =============================================================================

struct FixedProbe;

impl ProcessProbe for FixedProbe {
    fn snapshot(&mut self) -> ProcessSnapshot {
        ProcessSnapshot {
            private_bytes: 64 * 1024 * 1024,
            available_bytes: 512 * 1024 * 1024,
            processor_time_pct: 25.0,
            process_time_pct: 5.0,
        }
    }
}

#[derive(Default)]
struct MetricSink {
    batches: Mutex<Vec<Vec<DataPoint>>>,
}

impl MetricSink {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn points(&self) -> Vec<DataPoint> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    fn value_of(&self, name: &str) -> Option<f64> {
        self.points().iter().find(|p| p.name == name).map(|p| p.value)
    }
}

#[async_trait::async_trait]
impl MetricsExporter for MetricSink {
    async fn export(&self, batch: Vec<DataPoint>) -> ExportOutcome {
        self.batches.lock().push(batch);
        ExportOutcome::Success
    }
}

#[derive(Default)]
struct SpanSink {
    spans: Mutex<Vec<SpanData>>,
}

impl SpanSink {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn names(&self) -> Vec<String> {
        self.spans.lock().iter().map(|s| s.name.clone()).collect()
    }
}

#[async_trait::async_trait]
impl SpanExporter for SpanSink {
    async fn export(&self, batch: Vec<SpanData>) -> ExportOutcome {
        self.spans.lock().extend(batch);
        ExportOutcome::Success
    }
}

/// Span exporter that never completes an export.
struct StuckSpanExporter;

#[async_trait::async_trait]
impl SpanExporter for StuckSpanExporter {
    async fn export(&self, _batch: Vec<SpanData>) -> ExportOutcome {
        futures::future::pending::<()>().await;
        unreachable!()
    }
}

fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::new("integration-key");
    config.standard_tick_interval = Duration::from_millis(40);
    config.live_tick_interval = Duration::from_millis(15);
    config.heartbeat_interval = Duration::from_millis(60);
    config.batch.scheduled_delay = Duration::from_millis(30);
    config.batch.export_timeout = Duration::from_millis(500);
    config
}

fn metric_handler(
    config: PipelineConfig,
    standard: Arc<MetricSink>,
    live: Option<Arc<MetricSink>>,
) -> Arc<MetricHandler> {
    Arc::new(
        MetricHandler::with_registry(
            config,
            Arc::new(CounterRegistry::with_probe(Box::new(FixedProbe))),
            standard,
            live.map(|s| s as Arc<dyn MetricsExporter>),
        )
        .unwrap(),
    )
}

// =============================================================================
// Performance counters across destinations
// =============================================================================

mod perf_counter_tests {
    use super::*;

    #[tokio::test]
    async fn test_standard_export_carries_all_six_gauges() {
        let standard = MetricSink::new();
        let handler = metric_handler(fast_config(), standard.clone(), None);

        handler.start();
        handler.record_request(120.0, true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        handler.shutdown().await.unwrap();

        for gauge in [
            "process_private_bytes",
            "host_available_bytes",
            "host_processor_time",
            "process_processor_time",
            "request_rate",
            "request_duration",
        ] {
            assert!(
                standard.value_of(gauge).is_some(),
                "missing standard gauge {gauge}"
            );
        }

        // Process gauges reflect the probe.
        assert_eq!(
            standard.value_of("process_private_bytes"),
            Some((64u64 * 1024 * 1024) as f64)
        );
    }

    #[tokio::test]
    async fn test_live_destination_dark_until_configured() {
        let standard = MetricSink::new();
        let handler = metric_handler(fast_config(), standard.clone(), None);

        handler.start();
        handler.record_request(50.0, false);
        tokio::time::sleep(Duration::from_millis(100)).await;
        handler.shutdown().await.unwrap();

        // No live gauge ever reaches the standard destination, and no live
        // reader exists to export anywhere else.
        assert!(standard
            .points()
            .iter()
            .all(|p| !p.name.starts_with("live_")));
    }

    #[tokio::test]
    async fn test_destinations_drain_independent_windows() {
        let standard = MetricSink::new();
        let live = MetricSink::new();
        let mut config = fast_config();
        config.live_metrics_enabled = true;
        // Live ticks many times inside one standard window.
        config.standard_tick_interval = Duration::from_millis(150);
        config.live_tick_interval = Duration::from_millis(10);

        let handler = metric_handler(config, standard.clone(), Some(live.clone()));
        handler.start();

        for _ in 0..10 {
            handler.record_request(100.0, true);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        handler.shutdown().await.unwrap();

        // The fast live drains must not have stolen the standard window:
        // the standard duration gauge still sees the recorded average.
        assert_eq!(standard.value_of("request_duration"), Some(100.0));
    }

    #[tokio::test]
    async fn test_exceptions_feed_live_rate_only() {
        let standard = MetricSink::new();
        let live = MetricSink::new();
        let mut config = fast_config();
        config.live_metrics_enabled = true;

        let handler = metric_handler(config, standard.clone(), Some(live.clone()));
        handler.start();
        handler.record_exception();
        handler.record_exception();
        tokio::time::sleep(Duration::from_millis(80)).await;
        handler.shutdown().await.unwrap();

        let rates: Vec<f64> = live
            .points()
            .iter()
            .filter(|p| p.name == "live_exception_rate")
            .map(|p| p.value)
            .collect();
        assert!(rates.iter().any(|r| *r > 0.0));
        assert!(standard.value_of("live_exception_rate").is_none());
    }
}

// =============================================================================
// Metric handler lifecycle
// =============================================================================

mod metric_lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_start_twice_registers_instruments_once() {
        let handler = metric_handler(fast_config(), MetricSink::new(), None);

        handler.start();
        let first = handler.instrument_count();
        handler.start();

        assert_eq!(handler.instrument_count(), first);
        handler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_window_exports_zeros_not_nan() {
        let standard = MetricSink::new();
        let handler = metric_handler(fast_config(), standard.clone(), None);

        handler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handler.shutdown().await.unwrap();

        for point in standard.points() {
            assert!(
                point.value.is_finite(),
                "{} exported a non-finite value",
                point.name
            );
        }
        assert_eq!(standard.value_of("request_rate"), Some(0.0));
        assert_eq!(standard.value_of("requests_count"), Some(0.0));
    }

    #[tokio::test]
    async fn test_heartbeat_exported_with_properties() {
        let standard = MetricSink::new();
        let handler = metric_handler(fast_config(), standard.clone(), None);

        handler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handler.shutdown().await.unwrap();

        let points = standard.points();
        let heartbeat = points
            .iter()
            .find(|p| p.name == "heartbeat")
            .expect("heartbeat exported");
        assert_eq!(heartbeat.value, 1.0);
        assert!(heartbeat.attributes.contains_key("sdk_version"));
    }

    #[tokio::test]
    async fn test_shutdown_ships_window_tail() {
        let standard = MetricSink::new();
        let mut config = fast_config();
        // Intervals far beyond the test's lifetime; only the shutdown tick
        // can export.
        config.standard_tick_interval = Duration::from_secs(3600);
        config.heartbeat_interval = Duration::from_secs(3600);

        let handler = metric_handler(config, standard.clone(), None);
        handler.start();
        handler.record_request(75.0, true);
        handler.shutdown().await.unwrap();

        assert_eq!(standard.value_of("requests_count"), Some(1.0));
        assert_eq!(standard.value_of("request_duration"), Some(75.0));
    }
}

// =============================================================================
// Trace pipeline
// =============================================================================

mod trace_tests {
    use super::*;

    #[tokio::test]
    async fn test_spans_batched_and_exported() {
        let sink = SpanSink::new();
        let handler = TraceHandler::new(fast_config(), sink.clone(), None).unwrap();
        handler.start();

        handler.finish_span(SpanData::new("GET /a", SpanKind::Server, 10.0));
        handler.finish_span(SpanData::new("GET /b", SpanKind::Server, 20.0));
        handler.flush().await.unwrap();

        assert_eq!(sink.names(), vec!["GET /a", "GET /b"]);
        handler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_sampling_is_deterministic_per_trace() {
        let sink = SpanSink::new();
        let mut config = fast_config();
        config.sampling_ratio = 0.5;
        let handler = TraceHandler::new(config, sink.clone(), None).unwrap();

        // Every span of a trace shares the sampling decision, so a child
        // span is exported iff its root was.
        for i in 0..50 {
            let root = SpanData::new(format!("root-{i}"), SpanKind::Server, 5.0);
            let child = SpanData::child_of(&root, format!("child-{i}"), SpanKind::Client);
            handler.finish_span(root);
            handler.finish_span(child);
        }
        handler.flush().await.unwrap();

        let names = sink.names();
        for i in 0..50 {
            assert_eq!(
                names.contains(&format!("root-{i}")),
                names.contains(&format!("child-{i}")),
                "trace {i} was split by sampling"
            );
        }
        handler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_same_trace_id_same_decision_across_handlers() {
        let sink_a = SpanSink::new();
        let sink_b = SpanSink::new();
        let mut config = fast_config();
        config.sampling_ratio = 0.3;
        let handler_a = TraceHandler::new(config.clone(), sink_a.clone(), None).unwrap();
        let handler_b = TraceHandler::new(config, sink_b.clone(), None).unwrap();

        for i in 0..30 {
            let trace_id = Uuid::new_v4();
            let span = SpanData::new(format!("span-{i}"), SpanKind::Server, 1.0)
                .with_trace_id(trace_id);
            handler_a.finish_span(span.clone());
            handler_b.finish_span(span);
        }
        handler_a.flush().await.unwrap();
        handler_b.flush().await.unwrap();

        assert_eq!(sink_a.names(), sink_b.names());
        handler_a.shutdown().await.unwrap();
        handler_b.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_flush_bounded_against_stuck_exporter() {
        let mut config = fast_config();
        config.batch.export_timeout = Duration::from_millis(200);
        config.batch.scheduled_delay = Duration::from_secs(3600);
        let handler = TraceHandler::new(config, Arc::new(StuckSpanExporter), None).unwrap();

        handler.finish_span(SpanData::new("stuck", SpanKind::Server, 1.0));

        let started = std::time::Instant::now();
        let _ = handler.flush().await;
        assert!(started.elapsed() < Duration::from_secs(5));

        handler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_instrumentation_is_noop() {
        let handler = TraceHandler::new(fast_config(), SpanSink::new(), None).unwrap();
        handler.start();
        let count = handler.instrumentations().len();

        let existing = handler.add_instrumentation(Arc::new(LibraryInstrumentation::new(
            InstrumentationKind::Http,
        )));

        assert_eq!(handler.instrumentations().len(), count);
        assert!(existing.is_enabled());
        handler.shutdown().await.unwrap();
    }
}

// =============================================================================
// Combined pipeline
// =============================================================================

mod combined_tests {
    use super::*;

    #[tokio::test]
    async fn test_spans_drive_performance_counters() {
        let standard = MetricSink::new();
        let span_sink = SpanSink::new();
        let mut config = fast_config();
        config.standard_tick_interval = Duration::from_secs(3600);
        config.heartbeat_interval = Duration::from_secs(3600);

        let metrics = metric_handler(config.clone(), standard.clone(), None);
        let traces = TraceHandler::new(config, span_sink.clone(), Some(metrics.clone())).unwrap();

        metrics.start();
        traces.start();

        traces.finish_span(SpanData::new("GET /orders", SpanKind::Server, 100.0));
        traces.finish_span(SpanData::new("GET /orders", SpanKind::Server, 300.0));
        traces.finish_span(SpanData::new("SELECT", SpanKind::Client, 40.0).with_error());
        traces.flush().await.unwrap();

        traces.shutdown().await.unwrap();
        metrics.shutdown().await.unwrap();

        // Server spans became requests, the client span a failed dependency.
        assert_eq!(standard.value_of("request_duration"), Some(200.0));
        assert_eq!(span_sink.names().len(), 3);
    }

    #[tokio::test]
    async fn test_full_shutdown_sequence() {
        let standard = MetricSink::new();
        let span_sink = SpanSink::new();
        let config = fast_config();

        let metrics = metric_handler(config.clone(), standard.clone(), None);
        let traces = TraceHandler::new(config, span_sink.clone(), Some(metrics.clone())).unwrap();

        metrics.start();
        traces.start();
        traces.finish_span(SpanData::new("tail", SpanKind::Server, 5.0));

        traces.shutdown().await.unwrap();
        metrics.shutdown().await.unwrap();

        // Shutdown flushed the buffered span and disabled everything.
        assert_eq!(span_sink.names(), vec!["tail"]);
        assert!(traces
            .instrumentations()
            .list()
            .iter()
            .all(|i| !i.is_enabled()));

        // Both shutdowns are idempotent.
        traces.shutdown().await.unwrap();
        metrics.shutdown().await.unwrap();
    }
}
