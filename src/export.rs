//! Export ports
//!
//! The pipeline does not own wire protocols or retry/offline-storage
//! policies; both metric and span destinations are abstracted behind async
//! traits that report a coarse outcome. The outcome taxonomy is shared
//! between the two so flush-completion semantics are uniform.

use async_trait::async_trait;

use crate::counters::DataPoint;
use crate::traces::SpanData;

/// Coarse result of an export attempt.
///
/// Retry and offline storage are the exporter's own concern; the core only
/// needs to distinguish "done" from "gone wrong" for flush semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Batch was accepted by the destination
    Success,
    /// Transient failure; the exporter will retry on its own schedule
    RetryableFailure,
    /// Permanent failure; the batch is lost
    FatalFailure,
}

impl ExportOutcome {
    /// Whether the batch is out of the core's hands (accepted or owned by
    /// the exporter's retry policy).
    pub fn is_handled(&self) -> bool {
        !matches!(self, ExportOutcome::FatalFailure)
    }
}

/// Port for shipping metric data points to a destination.
#[async_trait]
pub trait MetricsExporter: Send + Sync {
    /// Export a batch of data points.
    async fn export(&self, batch: Vec<DataPoint>) -> ExportOutcome;
}

/// Port for shipping completed spans to a destination.
#[async_trait]
pub trait SpanExporter: Send + Sync {
    /// Export a batch of finished spans.
    async fn export(&self, batch: Vec<SpanData>) -> ExportOutcome;
}
