//! Configuration for ledgers and workflows.

use serde::Deserialize;
use thiserror::Error;

use qualitrace_core::MAX_SCORE;

/// Default minimum score for an inspection to pass.
pub const DEFAULT_PASS_THRESHOLD: u8 = 75;

/// Default number of oracle labels kept per inspection.
pub const DEFAULT_MAX_LABELS: usize = 3;

/// Configuration for the Qualitrace workflows.
///
/// Deserializable so hosts can load it from whatever format they use.
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QualitraceConfig {
    /// Inspections with `score >= pass_threshold` pass.
    pub pass_threshold: u8,
    /// Number of highest-confidence labels recorded per inspection.
    pub max_labels: usize,
    /// Refuse inspections of products without a registration block.
    pub require_registration: bool,
    /// Append a verification query block each time a product is verified.
    pub record_verification_queries: bool,
}

impl Default for QualitraceConfig {
    fn default() -> Self {
        Self {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            max_labels: DEFAULT_MAX_LABELS,
            require_registration: true,
            record_verification_queries: true,
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pass_threshold {0} exceeds the maximum score 100")]
    ThresholdOutOfRange(u8),

    #[error("max_labels must be at least 1")]
    NoLabels,
}

impl QualitraceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pass_threshold > MAX_SCORE {
            return Err(ConfigError::ThresholdOutOfRange(self.pass_threshold));
        }
        if self.max_labels == 0 {
            return Err(ConfigError::NoLabels);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QualitraceConfig::default();
        assert_eq!(config.pass_threshold, 75);
        assert_eq!(config.max_labels, 3);
        assert!(config.require_registration);
        assert!(config.record_verification_queries);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize() {
        let config: QualitraceConfig =
            serde_json::from_str(r#"{"pass_threshold": 80}"#).unwrap();
        assert_eq!(config.pass_threshold, 80);
        assert_eq!(config.max_labels, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = QualitraceConfig {
            pass_threshold: 101,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ThresholdOutOfRange(101)));

        let config = QualitraceConfig {
            max_labels: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoLabels));
    }
}
