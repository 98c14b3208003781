//! Pipeline configuration
//!
//! Configuration consumed by the metric and trace handlers. Construction is
//! cheap; [`PipelineConfig::validate`] is called by the handlers at
//! construction time so invalid settings fail fast instead of silently
//! degrading collection.

use std::time::Duration;

use crate::error::{Error, Result};

// =============================================================================
// Batch Tuning
// =============================================================================

/// Tuning knobs for the batching span processor.
///
/// `max_export_batch_size` and `max_queue_size` bound memory,
/// `scheduled_delay` bounds staleness, and `export_timeout` bounds
/// worst-case flush latency.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of spans sent in a single export call
    pub max_export_batch_size: usize,

    /// Maximum number of spans buffered before new spans are dropped
    pub max_queue_size: usize,

    /// Interval between scheduled batch exports
    pub scheduled_delay: Duration,

    /// Upper bound on a single export (and on flush completion)
    pub export_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_export_batch_size: 512,
            max_queue_size: 2048,
            scheduled_delay: Duration::from_secs(5),
            export_timeout: Duration::from_secs(30),
        }
    }
}

impl BatchConfig {
    /// Validate internal consistency of the tuning knobs.
    pub fn validate(&self) -> Result<()> {
        if self.max_export_batch_size == 0 {
            return Err(Error::InvalidBatchConfig(
                "max_export_batch_size must be greater than 0".into(),
            ));
        }
        if self.max_queue_size < self.max_export_batch_size {
            return Err(Error::InvalidBatchConfig(format!(
                "max_queue_size ({}) must be at least max_export_batch_size ({})",
                self.max_queue_size, self.max_export_batch_size
            )));
        }
        if self.export_timeout.is_zero() {
            return Err(Error::InvalidBatchConfig(
                "export_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Instrumentation Options
// =============================================================================

/// Per-instrumentation enable flags.
#[derive(Debug, Clone)]
pub struct InstrumentationOptions {
    /// HTTP client/server interception
    pub http: bool,

    /// SQL database interception
    pub sql: bool,

    /// NoSQL database interception
    pub nosql: bool,

    /// Cloud SDK interception
    pub sdk: bool,
}

impl Default for InstrumentationOptions {
    fn default() -> Self {
        Self {
            http: true,
            sql: true,
            nosql: true,
            sdk: true,
        }
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

/// Top-level configuration for the telemetry pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Export identity; required, validated at handler construction
    pub instrumentation_key: String,

    /// Trace sampling ratio (0.0 - 1.0), keyed by trace id
    pub sampling_ratio: f64,

    /// Collect process performance counters
    pub performance_counters_enabled: bool,

    /// Ship the high-frequency live metrics destination
    pub live_metrics_enabled: bool,

    /// Collect pre-aggregated standard metrics
    pub standard_metrics_enabled: bool,

    /// Emit periodic heartbeat metric
    pub heartbeat_enabled: bool,

    /// Collection interval for the standard (durable) destination
    pub standard_tick_interval: Duration,

    /// Collection interval for the live (near-real-time) destination
    pub live_tick_interval: Duration,

    /// Heartbeat emission interval
    pub heartbeat_interval: Duration,

    /// Batch span processor tuning
    pub batch: BatchConfig,

    /// Per-instrumentation enablement
    pub instrumentations: InstrumentationOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            instrumentation_key: String::new(),
            sampling_ratio: 1.0,
            performance_counters_enabled: true,
            live_metrics_enabled: false,
            standard_metrics_enabled: true,
            heartbeat_enabled: true,
            standard_tick_interval: Duration::from_secs(60),
            live_tick_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(900),
            batch: BatchConfig::default(),
            instrumentations: InstrumentationOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with the given instrumentation key and
    /// default settings.
    pub fn new(instrumentation_key: impl Into<String>) -> Self {
        Self {
            instrumentation_key: instrumentation_key.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration, failing fast on invalid settings.
    pub fn validate(&self) -> Result<()> {
        if self.instrumentation_key.trim().is_empty() {
            return Err(Error::MissingInstrumentationKey);
        }
        if !(0.0..=1.0).contains(&self.sampling_ratio) || !self.sampling_ratio.is_finite() {
            return Err(Error::InvalidSamplingRatio {
                value: self.sampling_ratio,
            });
        }
        self.batch.validate()?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_config_values() {
        let config = PipelineConfig::new("1aa11111-bbbb-1ccc-8ddd-eeeeffff3333");

        assert_eq!(config.sampling_ratio, 1.0);
        assert!(config.performance_counters_enabled);
        assert!(!config.live_metrics_enabled);
        assert!(config.standard_metrics_enabled);
        assert_eq!(config.standard_tick_interval, Duration::from_secs(60));
        assert_eq!(config.live_tick_interval, Duration::from_secs(1));
        assert_eq!(config.batch.max_export_batch_size, 512);
        assert_eq!(config.batch.max_queue_size, 2048);
        assert_eq!(config.batch.scheduled_delay, Duration::from_secs(5));
        assert_eq!(config.batch.export_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_valid_config_passes() {
        let config = PipelineConfig::new("key");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_key_fails_fast() {
        let config = PipelineConfig::default();
        assert_matches!(
            config.validate(),
            Err(Error::MissingInstrumentationKey)
        );

        let config = PipelineConfig::new("   ");
        assert_matches!(
            config.validate(),
            Err(Error::MissingInstrumentationKey)
        );
    }

    #[test]
    fn test_sampling_ratio_bounds() {
        let mut config = PipelineConfig::new("key");

        config.sampling_ratio = 0.0;
        assert!(config.validate().is_ok());

        config.sampling_ratio = 1.0;
        assert!(config.validate().is_ok());

        config.sampling_ratio = 1.1;
        assert_matches!(
            config.validate(),
            Err(Error::InvalidSamplingRatio { .. })
        );

        config.sampling_ratio = -0.1;
        assert_matches!(
            config.validate(),
            Err(Error::InvalidSamplingRatio { .. })
        );

        config.sampling_ratio = f64::NAN;
        assert_matches!(
            config.validate(),
            Err(Error::InvalidSamplingRatio { .. })
        );
    }

    #[test]
    fn test_batch_config_validation() {
        let mut batch = BatchConfig::default();
        assert!(batch.validate().is_ok());

        batch.max_export_batch_size = 0;
        assert_matches!(batch.validate(), Err(Error::InvalidBatchConfig(_)));

        batch.max_export_batch_size = 512;
        batch.max_queue_size = 100;
        assert_matches!(batch.validate(), Err(Error::InvalidBatchConfig(_)));

        batch.max_queue_size = 2048;
        batch.export_timeout = Duration::ZERO;
        assert_matches!(batch.validate(), Err(Error::InvalidBatchConfig(_)));
    }

    #[test]
    fn test_instrumentation_options_default_all_on() {
        let options = InstrumentationOptions::default();
        assert!(options.http);
        assert!(options.sql);
        assert!(options.nosql);
        assert!(options.sdk);
    }
}
