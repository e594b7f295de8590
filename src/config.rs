//! Health monitor configuration
//!
//! Loaded from JSON by hosts (every field optional) or assembled with the
//! builder in code and tests.

use serde::{Deserialize, Serialize};

use crate::srm::{DEFAULT_ALLOCATION_TOLERANCE, DEFAULT_SRM_ALPHA};
use crate::{Error, Result};

/// Tunables for [`crate::monitor::HealthMonitor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// SRM significance bar.
    pub srm_alpha: f64,
    /// Tolerance on the sum of variant shares.
    pub allocation_tolerance: f64,
    /// Metric catalog; rules on other metrics are rejected. `None` accepts any.
    pub known_metrics: Option<Vec<String>>,
    /// Evaluate experiments in parallel (needs the `rayon` feature).
    pub parallel: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            srm_alpha: DEFAULT_SRM_ALPHA,
            allocation_tolerance: DEFAULT_ALLOCATION_TOLERANCE,
            known_metrics: None,
            parallel: true,
        }
    }
}

impl HealthConfig {
    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> HealthConfigBuilder {
        HealthConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on malformed JSON and [`Error::Config`] on
    /// out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `srm_alpha` is outside (0, 1) or the
    /// allocation tolerance is negative.
    pub fn validate(&self) -> Result<()> {
        if !(self.srm_alpha > 0.0 && self.srm_alpha < 1.0) {
            return Err(Error::Config(format!(
                "srm_alpha must be in (0, 1), got {}",
                self.srm_alpha
            )));
        }
        if !self.allocation_tolerance.is_finite() || self.allocation_tolerance < 0.0 {
            return Err(Error::Config(format!(
                "allocation_tolerance must be >= 0, got {}",
                self.allocation_tolerance
            )));
        }
        Ok(())
    }
}

/// Builder for `HealthConfig`.
#[derive(Debug, Default)]
pub struct HealthConfigBuilder {
    config: HealthConfig,
}

impl HealthConfigBuilder {
    /// Set the SRM significance bar.
    #[must_use]
    pub const fn srm_alpha(mut self, alpha: f64) -> Self {
        self.config.srm_alpha = alpha;
        self
    }

    /// Set the tolerance on the sum of variant shares.
    #[must_use]
    pub const fn allocation_tolerance(mut self, tolerance: f64) -> Self {
        self.config.allocation_tolerance = tolerance;
        self
    }

    /// Restrict rules to a metric catalog.
    #[must_use]
    pub fn known_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.known_metrics = Some(metrics.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable parallel evaluation across experiments.
    #[must_use]
    pub const fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on out-of-range values.
    pub fn build(self) -> Result<HealthConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HealthConfig::default();
        assert!((config.srm_alpha - 0.001).abs() < f64::EPSILON);
        assert!(config.known_metrics.is_none());
        assert!(config.parallel);
    }

    #[test]
    fn test_from_json_partial() {
        let config = HealthConfig::from_json_str(r#"{"srm_alpha": 0.01}"#).unwrap();
        assert!((config.srm_alpha - 0.01).abs() < f64::EPSILON);
        assert!(config.parallel);
    }

    #[test]
    fn test_from_json_rejects_bad_alpha() {
        let err = HealthConfig::from_json_str(r#"{"srm_alpha": 1.5}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let err = HealthConfig::from_json_str("srm_alpha=0.1").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_builder() {
        let config = HealthConfig::builder()
            .known_metrics(["bounce_rate", "revenue"])
            .parallel(false)
            .build()
            .unwrap();
        assert_eq!(config.known_metrics.unwrap().len(), 2);
        assert!(!config.parallel);
    }
}
