//! Deterministic trace sampler
//!
//! The sampling decision is a pure function of the trace id, so every span
//! within one trace (and every component looking at the same trace) reaches
//! the same decision without coordination. Span content never influences
//! the outcome.

use uuid::Uuid;

use crate::error::{Error, Result};

/// Ratio-based sampler keyed by trace id.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    ratio: f64,
}

impl Sampler {
    /// Create a sampler; the ratio must be within 0.0..=1.0 or
    /// construction fails fast.
    pub fn new(ratio: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&ratio) || !ratio.is_finite() {
            return Err(Error::InvalidSamplingRatio { value: ratio });
        }
        Ok(Self { ratio })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Decide whether a trace is sampled in.
    pub fn should_sample(&self, trace_id: &Uuid) -> bool {
        if self.ratio >= 1.0 {
            return true;
        }
        if self.ratio <= 0.0 {
            return false;
        }
        Self::score(trace_id) < self.ratio * 100.0
    }

    /// Map a trace id onto [0, 100) deterministically.
    fn score(trace_id: &Uuid) -> f64 {
        // FNV-1a over the raw id bytes
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in trace_id.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        (hash % 10_000) as f64 / 100.0
    }
}

// =============================================================================
// Tests
// =============================================================================
