//! Span value objects and the span processor port
//!
//! Spans are produced by instrumentation collaborators; the pipeline only
//! needs the fields a processor consumes on completion: kind, duration and
//! error status. Processors must never block the producing request path in
//! `on_end`; anything slow belongs behind a queue.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

/// Role of a span within a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpanKind {
    /// Inbound request handled by this process
    Server,
    /// Outbound call to a dependency
    Client,
    /// Message published to a broker
    Producer,
    /// Message consumed from a broker
    Consumer,
    /// In-process operation
    Internal,
}

/// A finished span as seen by the processor chain.
#[derive(Debug, Clone, Serialize)]
pub struct SpanData {
    /// Trace this span belongs to; sampling is keyed on this alone
    pub trace_id: Uuid,
    /// Unique span identity
    pub span_id: Uuid,
    /// Parent span, if any
    pub parent_span_id: Option<Uuid>,
    /// Operation name
    pub name: String,
    /// Span role
    pub kind: SpanKind,
    /// When the span started
    pub start_time: DateTime<Utc>,
    /// Wall-clock duration of the operation
    pub duration_ms: f64,
    /// Whether the span ended in an error status
    pub status_is_error: bool,
    /// Free-form attributes
    pub attributes: HashMap<String, String>,
}

impl SpanData {
    /// Create a finished root span.
    pub fn new(name: impl Into<String>, kind: SpanKind, duration_ms: f64) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            name: name.into(),
            kind,
            start_time: Utc::now(),
            duration_ms,
            status_is_error: false,
            attributes: HashMap::new(),
        }
    }

    /// Create a finished child span sharing the parent's trace id.
    pub fn child_of(parent: &SpanData, name: impl Into<String>, kind: SpanKind) -> Self {
        Self {
            trace_id: parent.trace_id,
            parent_span_id: Some(parent.span_id),
            ..Self::new(name, kind, 0.0)
        }
    }

    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn with_error(mut self) -> Self {
        self.status_is_error = true;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Port for span completion consumers.
///
/// `on_end` runs on the producing context and must not block; flush and
/// shutdown are the only operations allowed to await I/O.
#[async_trait::async_trait]
pub trait SpanProcessor: Send + Sync {
    /// Observe a finished span. Non-blocking.
    fn on_end(&self, span: &SpanData);

    /// Push any buffered spans to the exporter, bounded by the processor's
    /// export timeout.
    async fn force_flush(&self) -> Result<()>;

    /// Flush and release resources. Idempotent.
    async fn shutdown(&self) -> Result<()>;
}
