//! Trace collection and export
//!
//! The trace side of the pipeline: span value objects, the deterministic
//! sampler, the batching span processor, the perf counter bridge, the
//! instrumentation registry, and the trace handler that wires them up.

pub mod batch;
pub mod bridge;
pub mod handler;
pub mod instrumentation;
pub mod sampler;
pub mod span;

pub use batch::BatchSpanProcessor;
pub use bridge::PerfBridgeProcessor;
pub use handler::{InvocationHook, TraceHandler, TracePipeline};
pub use instrumentation::{
    HttpPerfInstrumentation, Instrumentation, InstrumentationKind, InstrumentationRegistry,
    LibraryInstrumentation,
};
pub use sampler::Sampler;
pub use span::{SpanData, SpanKind, SpanProcessor};
