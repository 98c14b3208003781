//! Counter Registry and gauge instruments
//!
//! Raw counter state mutated by instrumentation callbacks between ticks,
//! plus the gauge instruments that derive exportable values from it.

mod gauge;
mod registry;

pub use gauge::{DataPoint, Gauge, GaugeId, GaugeSet, TickOutcome, TickSample};
pub use registry::{
    CompletionKind, CounterRegistry, Destination, ProcessProbe, ProcessSnapshot, SysinfoProbe,
    WindowSample, WindowStats,
};
