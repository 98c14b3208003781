//! Error types for the telemetry pipeline

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the telemetry pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Sampling ratio outside the accepted 0.0..=1.0 range
    #[error("Invalid sampling ratio {value}: must be between 0.0 and 1.0")]
    InvalidSamplingRatio { value: f64 },

    /// Connection identity missing from the configuration
    #[error("Missing instrumentation key: an export identity is required")]
    MissingInstrumentationKey,

    /// Batch processor tuning knobs are inconsistent
    #[error("Invalid batch configuration: {0}")]
    InvalidBatchConfig(String),

    /// A gauge read function failed during a collection tick
    #[error("Gauge '{gauge}' failed to read: {reason}")]
    GaugeRead { gauge: String, reason: String },

    /// Flush did not complete within its timeout bound
    #[error("Flush timed out after {timeout:?}")]
    FlushTimeout { timeout: Duration },

    /// An exporter reported a non-recoverable failure
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidSamplingRatio { value: 1.5 };
        assert!(err.to_string().contains("1.5"));

        let err = Error::GaugeRead {
            gauge: "request_rate".into(),
            reason: "probe unavailable".into(),
        };
        assert!(err.to_string().contains("request_rate"));
        assert!(err.to_string().contains("probe unavailable"));
    }

    #[test]
    fn test_flush_timeout_display() {
        let err = Error::FlushTimeout {
            timeout: Duration::from_secs(30),
        };
        assert!(err.to_string().contains("30"));
    }
}
