//! Performance counter collection
//!
//! Periodic derivation of rate/duration/instantaneous gauges from the
//! counter registry, once per export destination.

mod collector;

pub use collector::PerformanceCollector;
