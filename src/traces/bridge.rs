//! Bridge span processor
//!
//! A span-processor-shaped adapter that forwards span outcomes into the
//! counter registry instead of exporting them, feeding the derived
//! request/dependency rate, duration and failure-rate gauges. It consumes
//! span completion events only, so its position in the processor chain
//! does not affect correctness.

use std::sync::Arc;

use crate::counters::CounterRegistry;
use crate::error::Result;
use crate::traces::span::{SpanData, SpanKind, SpanProcessor};

/// Feeds completed span outcomes into the performance counter registry.
pub struct PerfBridgeProcessor {
    registry: Arc<CounterRegistry>,
}

impl PerfBridgeProcessor {
    pub fn new(registry: Arc<CounterRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait::async_trait]
impl SpanProcessor for PerfBridgeProcessor {
    fn on_end(&self, span: &SpanData) {
        match span.kind {
            SpanKind::Server | SpanKind::Consumer => {
                self.registry
                    .record_request(span.duration_ms, !span.status_is_error);
            }
            SpanKind::Client | SpanKind::Producer => {
                self.registry
                    .record_dependency(span.duration_ms, !span.status_is_error);
            }
            SpanKind::Internal => {}
        }
    }

    async fn force_flush(&self) -> Result<()> {
        // Nothing buffered; counters are read by the next collection tick.
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
