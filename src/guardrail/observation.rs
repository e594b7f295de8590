//! Metric Observation - latest value of a metric fed to the guardrail engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The newest value of one metric, plus the value before it when known.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricObservation {
    metric: String,
    value: f64,
    observed_at: DateTime<Utc>,
    previous_value: Option<f64>,
}

impl MetricObservation {
    /// Create an observation without a previous value.
    #[must_use]
    pub fn new(metric: impl Into<String>, value: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            metric: metric.into(),
            value,
            observed_at,
            previous_value: None,
        }
    }

    /// Attach the previous value of the same metric.
    #[must_use]
    pub const fn with_previous(mut self, previous_value: f64) -> Self {
        self.previous_value = Some(previous_value);
        self
    }

    /// Get the metric key.
    #[must_use]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Get the observed value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the observation timestamp.
    #[must_use]
    pub const fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Get the previous value, if any.
    #[must_use]
    pub const fn previous_value(&self) -> Option<f64> {
        self.previous_value
    }

    /// Relative change from the previous value, in percent.
    ///
    /// Moving off a previous value of zero is an infinite change; staying at
    /// zero is no change. `None` without a previous value.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn change_percent(&self) -> Option<f64> {
        let previous = self.previous_value?;
        let delta = (self.value - previous).abs();
        if previous == 0.0 {
            return Some(if delta == 0.0 { 0.0 } else { f64::INFINITY });
        }
        Some(delta / previous.abs() * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_percent() {
        let obs = MetricObservation::new("m", 90.0, Utc::now()).with_previous(120.0);
        assert!((obs.change_percent().unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_change_percent_from_zero() {
        let moved = MetricObservation::new("m", 1.0, Utc::now()).with_previous(0.0);
        assert!(moved.change_percent().unwrap().is_infinite());

        let flat = MetricObservation::new("m", 0.0, Utc::now()).with_previous(0.0);
        assert_eq!(flat.change_percent(), Some(0.0));
    }
}
