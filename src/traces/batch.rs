//! Batching span processor
//!
//! Buffers finished spans and ships them to the span exporter in bounded
//! batches from a background worker. Producers never block: the queue is a
//! bounded channel and a span offered to a full queue is dropped (newest
//! first) and counted. The scheduled delay bounds staleness, the batch and
//! queue sizes bound memory, and the export timeout bounds worst-case
//! flush latency.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::export::{ExportOutcome, SpanExporter};
use crate::traces::span::{SpanData, SpanProcessor};

enum ControlMessage {
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Span processor that batches completed spans for durable export.
pub struct BatchSpanProcessor {
    span_tx: mpsc::Sender<SpanData>,
    control_tx: mpsc::UnboundedSender<ControlMessage>,
    dropped: AtomicU64,
    shut_down: AtomicBool,
    export_timeout: Duration,
}

impl BatchSpanProcessor {
    /// Create the processor and spawn its worker. Must be called from
    /// within a tokio runtime.
    pub fn new(exporter: Arc<dyn SpanExporter>, config: BatchConfig) -> Result<Self> {
        config.validate()?;

        let (span_tx, span_rx) = mpsc::channel(config.max_queue_size);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let export_timeout = config.export_timeout;

        tokio::spawn(run_worker(exporter, span_rx, control_rx, config));

        Ok(Self {
            span_tx,
            control_tx,
            dropped: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
            export_timeout,
        })
    }

    /// Spans dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

#[async_trait::async_trait]
impl SpanProcessor for BatchSpanProcessor {
    fn on_end(&self, span: &SpanData) {
        if self.is_shut_down() {
            return;
        }
        match self.span_tx.try_send(span.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Overflow policy: drop the span being offered, never block
                // the producing request path.
                let previous = self.dropped.fetch_add(1, Ordering::Relaxed);
                if previous == 0 {
                    warn!("Span queue full, dropping spans (further drops logged at debug)");
                } else {
                    debug!(dropped = previous + 1, "Span queue full, span dropped");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    async fn force_flush(&self) -> Result<()> {
        if self.is_shut_down() {
            return Ok(());
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .control_tx
            .send(ControlMessage::Flush(ack_tx))
            .is_err()
        {
            // Worker already gone; nothing buffered anymore.
            return Ok(());
        }
        match timeout(self.export_timeout, ack_rx).await {
            Ok(_) => Ok(()),
            Err(_) => Err(Error::FlushTimeout {
                timeout: self.export_timeout,
            }),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .control_tx
            .send(ControlMessage::Shutdown(ack_tx))
            .is_err()
        {
            return Ok(());
        }
        if timeout(self.export_timeout, ack_rx).await.is_err() {
            warn!("Span processor shutdown did not drain within the export timeout");
        }
        Ok(())
    }
}

// =============================================================================
// Worker
// =============================================================================

async fn run_worker(
    exporter: Arc<dyn SpanExporter>,
    mut span_rx: mpsc::Receiver<SpanData>,
    mut control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    config: BatchConfig,
) {
    let mut buffer: Vec<SpanData> = Vec::with_capacity(config.max_export_batch_size);
    let mut ticker = interval(config.scheduled_delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // consume the immediate first tick

    let mut producers_gone = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    export_all(&exporter, &config, &mut buffer).await;
                }
            }
            maybe_span = span_rx.recv(), if !producers_gone => {
                match maybe_span {
                    Some(span) => {
                        buffer.push(span);
                        if buffer.len() >= config.max_export_batch_size {
                            export_all(&exporter, &config, &mut buffer).await;
                        }
                    }
                    None => producers_gone = true,
                }
            }
            maybe_msg = control_rx.recv() => {
                match maybe_msg {
                    Some(ControlMessage::Flush(ack)) => {
                        drain_pending(&mut span_rx, &mut buffer);
                        export_all(&exporter, &config, &mut buffer).await;
                        let _ = ack.send(());
                    }
                    Some(ControlMessage::Shutdown(ack)) => {
                        drain_pending(&mut span_rx, &mut buffer);
                        export_all(&exporter, &config, &mut buffer).await;
                        let _ = ack.send(());
                        break;
                    }
                    // Processor handle dropped without shutdown; drain and stop.
                    None => {
                        drain_pending(&mut span_rx, &mut buffer);
                        export_all(&exporter, &config, &mut buffer).await;
                        break;
                    }
                }
            }
        }
    }
    debug!("Batch span worker stopped");
}

/// Move everything already queued into the buffer without awaiting.
fn drain_pending(span_rx: &mut mpsc::Receiver<SpanData>, buffer: &mut Vec<SpanData>) {
    while let Ok(span) = span_rx.try_recv() {
        buffer.push(span);
    }
}

/// Export the buffer in batches of at most `max_export_batch_size`, each
/// bounded by the export timeout.
async fn export_all(
    exporter: &Arc<dyn SpanExporter>,
    config: &BatchConfig,
    buffer: &mut Vec<SpanData>,
) {
    while !buffer.is_empty() {
        let take = buffer.len().min(config.max_export_batch_size);
        let batch: Vec<SpanData> = buffer.drain(..take).collect();
        let size = batch.len();

        match timeout(config.export_timeout, exporter.export(batch)).await {
            Ok(ExportOutcome::Success) => {
                debug!(spans = size, "Span batch exported");
            }
            Ok(ExportOutcome::RetryableFailure) => {
                debug!(spans = size, "Span export deferred to exporter retry policy");
            }
            Ok(ExportOutcome::FatalFailure) => {
                warn!(spans = size, "Span batch lost to fatal export failure");
            }
            Err(_) => {
                warn!(spans = size, "Span export timed out, batch abandoned");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
