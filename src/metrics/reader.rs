//! Periodic export readers
//!
//! One reader per destination schedule: on every tick it pulls a batch of
//! data points from its source and hands them to the destination's
//! exporter. Stopping a reader runs one final tick so nothing accumulated
//! since the last interval is lost on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::counters::TickOutcome;
use crate::export::{ExportOutcome, MetricsExporter};

pub(crate) type PointSource = Box<dyn Fn() -> TickOutcome + Send + Sync>;

/// Background loop shipping one source to one exporter on a fixed period.
pub(crate) struct PeriodicReader {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicReader {
    /// Spawn the reader loop. Must be called from within a tokio runtime.
    pub fn spawn(
        name: &'static str,
        period: Duration,
        source: PointSource,
        exporter: Arc<dyn MetricsExporter>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => {
                        // Final tick so the tail of the window is exported.
                        tick_once(name, &source, &exporter).await;
                        break;
                    }
                    _ = ticker.tick() => {
                        tick_once(name, &source, &exporter).await;
                    }
                }
            }
            debug!(reader = name, "export reader stopped");
        });

        Self {
            name,
            cancel,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cancel the loop and wait for its final tick to complete.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(reader = self.name, "export reader task failed: {e}");
        }
    }
}

async fn tick_once(name: &'static str, source: &PointSource, exporter: &Arc<dyn MetricsExporter>) {
    let outcome = source();
    for error in &outcome.errors {
        warn!(reader = name, %error, "gauge read failed during tick");
    }
    if outcome.points.is_empty() {
        return;
    }

    let size = outcome.points.len();
    match exporter.export(outcome.points).await {
        ExportOutcome::Success => debug!(reader = name, points = size, "metrics exported"),
        ExportOutcome::RetryableFailure => {
            debug!(reader = name, points = size, "metrics export deferred to retry policy")
        }
        ExportOutcome::FatalFailure => {
            warn!(reader = name, points = size, "metrics batch lost to fatal export failure")
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
