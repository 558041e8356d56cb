//! Configuration for a reconstruction run.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stats::TestKind;

/// Environment variable overriding [`InferenceConfig::max_length`].
pub const ENV_MAX_LENGTH: &str = "CSSR_MAX_LENGTH";
/// Environment variable overriding [`InferenceConfig::significance_level`].
pub const ENV_SIGNIFICANCE: &str = "CSSR_SIGNIFICANCE";
/// Environment variable overriding [`InferenceConfig::test_kind`] (`ks` or `ch`).
pub const ENV_TEST: &str = "CSSR_TEST";
/// Environment variable overriding [`InferenceConfig::min_sample`].
pub const ENV_MIN_SAMPLE: &str = "CSSR_MIN_SAMPLE";

/// Parameters of a reconstruction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// The longest history considered. Must be at least 2.
    pub max_length: usize,
    /// False-positive rate of the equivalence test, in the open interval (0, 1).
    pub significance_level: f64,
    /// Which equivalence test decides whether two distributions differ.
    pub test_kind: TestKind,
    /// Histories with fewer next-symbol observations than this are not tested;
    /// they join their suffix's state provisionally.
    pub min_sample: u64,
    /// Upper bound on the number of distinct histories stored in the tree.
    pub max_histories: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_length: 3,
            significance_level: 0.05,
            test_kind: TestKind::KolmogorovSmirnov,
            min_sample: 5,
            max_histories: 10_000_000,
        }
    }
}

impl InferenceConfig {
    /// Creates a configuration with the given maximum history length and
    /// defaults for everything else.
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            ..Default::default()
        }
    }

    /// Builds a configuration from the defaults, overridden by `CSSR_*`
    /// environment variables. Unparseable values are ignored; call
    /// [`validate`](Self::validate) on the result.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENV_MAX_LENGTH) {
            if let Ok(max_length) = value.trim().parse::<usize>() {
                config.max_length = max_length;
            }
        }

        if let Ok(value) = std::env::var(ENV_SIGNIFICANCE) {
            if let Ok(level) = value.trim().parse::<f64>() {
                config.significance_level = level;
            }
        }

        if let Ok(value) = std::env::var(ENV_TEST) {
            if let Ok(kind) = value.parse::<TestKind>() {
                config.test_kind = kind;
            }
        }

        if let Ok(value) = std::env::var(ENV_MIN_SAMPLE) {
            if let Ok(min_sample) = value.trim().parse::<u64>() {
                config.min_sample = min_sample;
            }
        }

        config
    }

    /// Sets the significance level.
    pub fn with_significance(mut self, level: f64) -> Self {
        self.significance_level = level;
        self
    }

    /// Sets the equivalence test.
    pub fn with_test(mut self, kind: TestKind) -> Self {
        self.test_kind = kind;
        self
    }

    /// Sets the minimum sample size for testing a history.
    pub fn with_min_sample(mut self, min_sample: u64) -> Self {
        self.min_sample = min_sample;
        self
    }

    /// Sets the cap on distinct stored histories.
    pub fn with_max_histories(mut self, max_histories: usize) -> Self {
        self.max_histories = max_histories;
        self
    }

    /// Checks every parameter range.
    pub fn validate(&self) -> Result<()> {
        if self.max_length < 2 {
            return Err(Error::InvalidParameter(format!(
                "max_length must be at least 2, got {}",
                self.max_length
            )));
        }
        let level = self.significance_level;
        if !level.is_finite() || level <= 0.0 || level >= 1.0 {
            return Err(Error::InvalidParameter(format!(
                "significance_level must lie in (0, 1), got {}",
                level
            )));
        }
        if self.min_sample == 0 {
            return Err(Error::InvalidParameter(
                "min_sample must be at least 1".to_string(),
            ));
        }
        if self.max_histories == 0 {
            return Err(Error::InvalidParameter(
                "max_histories must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = InferenceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.test_kind, TestKind::KolmogorovSmirnov);
    }

    #[test]
    fn test_max_length_range() {
        assert!(InferenceConfig::new(1).validate().is_err());
        assert!(InferenceConfig::new(0).validate().is_err());
        assert!(InferenceConfig::new(2).validate().is_ok());
    }

    #[test]
    fn test_significance_range() {
        for level in [0.0, 1.0, -0.1, 1.5, f64::NAN, f64::INFINITY] {
            let config = InferenceConfig::new(3).with_significance(level);
            assert!(
                matches!(config.validate(), Err(Error::InvalidParameter(_))),
                "level {} accepted",
                level
            );
        }
        assert!(InferenceConfig::new(3)
            .with_significance(0.001)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_min_sample_and_history_cap() {
        assert!(InferenceConfig::new(3).with_min_sample(0).validate().is_err());
        assert!(InferenceConfig::new(3)
            .with_max_histories(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_from_env_no_env() {
        let config = InferenceConfig::from_env();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = InferenceConfig::new(4).with_test(TestKind::ChiSquared);
        let json = serde_json::to_string(&config).unwrap();
        let back: InferenceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
