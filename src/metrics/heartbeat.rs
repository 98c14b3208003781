//! Heartbeat metric
//!
//! A constant-1 gauge emitted on a long interval carrying static runtime
//! properties, so the backend can tell a silent process from a dead one.

use std::collections::BTreeMap;

use crate::counters::{DataPoint, TickOutcome};

/// Emits the periodic heartbeat data point.
pub struct HeartbeatHandler {
    properties: BTreeMap<String, String>,
}

impl HeartbeatHandler {
    pub fn new() -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("sdk_version".to_string(), env!("CARGO_PKG_VERSION").to_string());
        properties.insert("os".to_string(), std::env::consts::OS.to_string());
        properties.insert("arch".to_string(), std::env::consts::ARCH.to_string());
        Self { properties }
    }

    /// Add or override a heartbeat property before start.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn collect(&self) -> TickOutcome {
        let mut point = DataPoint::named("heartbeat", 1.0);
        point.attributes = self.properties.clone();
        TickOutcome {
            points: vec![point],
            errors: vec![],
        }
    }

    pub fn instrument_count(&self) -> usize {
        1
    }
}

impl Default for HeartbeatHandler {
    fn default() -> Self {
        Self::new()
    }
}
