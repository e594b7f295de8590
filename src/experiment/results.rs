//! Experiment Results - statistical summary consumed by the recommendation engine

use serde::{Deserialize, Serialize};

/// Control vs. treatment outcome on the primary metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PrimaryMetric {
    /// Control group value.
    pub control: f64,
    /// Treatment group value.
    pub treatment: f64,
    /// Relative difference, in percent.
    pub lift: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Whether the result cleared the experiment's significance bar.
    pub is_significant: bool,
}

impl PrimaryMetric {
    /// Create a primary metric result from the significance outcome alone.
    ///
    /// Control, treatment and p-value default to zero.
    #[must_use]
    pub const fn from_lift(lift: f64, is_significant: bool) -> Self {
        Self {
            control: 0.0,
            treatment: 0.0,
            lift,
            p_value: 0.0,
            is_significant,
        }
    }
}

/// Health of a guardrail metric at analysis time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailStatus {
    /// Within bounds.
    Passed,
    /// Close to the bound.
    Warning,
    /// Bound crossed.
    Failed,
}

/// A secondary metric that must stay within bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardrailMetric {
    /// Metric name.
    pub name: String,
    /// Observed value.
    pub value: f64,
    /// Bound the value is judged against.
    pub threshold: f64,
    /// Classification.
    pub status: GuardrailStatus,
}

impl GuardrailMetric {
    /// Create a guardrail metric result.
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64, threshold: f64, status: GuardrailStatus) -> Self {
        Self {
            name: name.into(),
            value,
            threshold,
            status,
        }
    }
}

/// Achieved vs. planned sample size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SampleSize {
    /// Units enrolled so far.
    pub actual: u64,
    /// Units the power analysis asked for. Zero when unknown.
    pub expected: u64,
}

impl SampleSize {
    /// `actual / expected`, or `None` without a target.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(self) -> Option<f64> {
        (self.expected > 0).then(|| self.actual as f64 / self.expected as f64)
    }
}

/// Statistical results of a running or completed experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentResults {
    /// Primary metric outcome.
    pub primary_metric: PrimaryMetric,
    /// Guardrail metric outcomes.
    pub guardrail_metrics: Vec<GuardrailMetric>,
    /// Sample size progress.
    pub sample_size: SampleSize,
}

impl ExperimentResults {
    /// Create results with no guardrail metrics.
    #[must_use]
    pub const fn new(primary_metric: PrimaryMetric, sample_size: SampleSize) -> Self {
        Self {
            primary_metric,
            guardrail_metrics: Vec::new(),
            sample_size,
        }
    }

    /// Add a guardrail metric.
    #[must_use]
    pub fn with_guardrail(mut self, metric: GuardrailMetric) -> Self {
        self.guardrail_metrics.push(metric);
        self
    }

    /// Number of guardrail metrics with the given status.
    #[must_use]
    pub fn count_with_status(&self, status: GuardrailStatus) -> usize {
        self.guardrail_metrics
            .iter()
            .filter(|m| m.status == status)
            .count()
    }
}
