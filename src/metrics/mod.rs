//! Metric collection and export
//!
//! The metric side of the pipeline: performance counter collection via the
//! [`crate::perf`] collector, pre-aggregated standard metrics, the
//! heartbeat, and the periodic readers that ship each source to its
//! destination exporter.

pub mod handler;
pub mod heartbeat;
pub(crate) mod reader;
pub mod standard;

pub use handler::MetricHandler;
pub use heartbeat::HeartbeatHandler;
pub use standard::{StandardMetricsHandler, STANDARD_METRIC_COUNT};
