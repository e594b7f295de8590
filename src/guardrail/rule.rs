//! Guardrail Rule - operator-defined safety threshold on a live metric

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::MetricObservation;
use crate::{Error, Result};

/// How the observed value is compared to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Triggers when the value is strictly above the threshold.
    Above,
    /// Triggers when the value is strictly below the threshold.
    Below,
    /// Triggers when the relative change from the previous value exceeds
    /// the threshold, in percent.
    ChangeExceeds,
}

/// Unit the threshold is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Percentage points (e.g. bounce rate 65 = 65%).
    Percentage,
    /// Raw metric value (e.g. latency in ms).
    Absolute,
}

/// Action requested from the experiment runtime when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Notify the experiment owner.
    Alert,
    /// Pause traffic allocation.
    Pause,
    /// Stop the experiment.
    Stop,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above => write!(f, "above"),
            Self::Below => write!(f, "below"),
            Self::ChangeExceeds => write!(f, "change_exceeds"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Pause => write!(f, "pause"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Guardrail Rule watches one metric of one experiment.
///
/// The only field the engine ever mutates is `last_triggered_at`, and only
/// through [`crate::store::RuleStore::compare_and_set_last_triggered`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardrailRule {
    id: String,
    experiment_id: String,
    name: String,
    metric: String,
    condition: Condition,
    threshold: f64,
    unit: Unit,
    action: Action,
    cooldown_hours: f64,
    enabled: bool,
    last_triggered_at: Option<DateTime<Utc>>,
}

impl GuardrailRule {
    /// Create a builder with the required identifying fields.
    ///
    /// Defaults: `above 0 absolute`, action `alert`, no cooldown, enabled.
    #[must_use]
    pub fn builder(
        id: impl Into<String>,
        experiment_id: impl Into<String>,
        metric: impl Into<String>,
    ) -> GuardrailRuleBuilder {
        GuardrailRuleBuilder::new(id, experiment_id, metric)
    }

    /// Parse a persisted rule definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptRule`] if the JSON cannot be read, and
    /// [`Error::InvalidRule`] if it parses but breaks a rule invariant.
    pub fn from_json(json: &str) -> Result<Self> {
        let rule: Self =
            serde_json::from_str(json).map_err(|e| Error::CorruptRule(e.to_string()))?;
        rule.validate(None)?;
        Ok(rule)
    }

    /// Check rule invariants, optionally against a metric catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRule`] on an empty ID or metric, a metric the
    /// catalog does not know, a non-finite threshold, or a negative or
    /// non-finite cooldown.
    pub fn validate(&self, known_metrics: Option<&[String]>) -> Result<()> {
        let invalid = |reason: String| Error::InvalidRule {
            rule_id: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("rule ID must not be empty".to_string()));
        }
        if self.metric.trim().is_empty() {
            return Err(invalid("metric must not be empty".to_string()));
        }
        if let Some(catalog) = known_metrics {
            if !catalog.iter().any(|m| m == &self.metric) {
                return Err(invalid(format!("unknown metric '{}'", self.metric)));
            }
        }
        if !self.threshold.is_finite() {
            return Err(invalid(format!("threshold {} is not finite", self.threshold)));
        }
        if !self.cooldown_hours.is_finite() || self.cooldown_hours < 0.0 {
            return Err(invalid(format!(
                "cooldown_hours must be >= 0, got {}",
                self.cooldown_hours
            )));
        }
        Ok(())
    }

    /// Get the rule ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the experiment this rule guards.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the watched metric key.
    #[must_use]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Get the comparison condition.
    #[must_use]
    pub const fn condition(&self) -> Condition {
        self.condition
    }

    /// Get the threshold.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Get the threshold unit.
    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    /// Get the action requested on breach.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.action
    }

    /// Get the cooldown in hours.
    #[must_use]
    pub const fn cooldown_hours(&self) -> f64 {
        self.cooldown_hours
    }

    /// Whether the rule is active.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// When the rule last fired an action, if ever.
    #[must_use]
    pub const fn last_triggered_at(&self) -> Option<DateTime<Utc>> {
        self.last_triggered_at
    }

    /// Cooldown as a duration. `None` when it does not fit a `Duration`,
    /// which callers treat as a cooldown that never expires.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cooldown(&self) -> Option<Duration> {
        Duration::try_milliseconds((self.cooldown_hours * 3_600_000.0).round() as i64)
    }

    /// Enable or disable the rule (operator edit).
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Overwrite the last trigger time.
    ///
    /// For repository implementations only; the engine goes through
    /// compare-and-set on the store.
    pub fn set_last_triggered_at(&mut self, at: Option<DateTime<Utc>>) {
        self.last_triggered_at = at;
    }

    /// Whether the observation breaches this rule's condition.
    ///
    /// Ignores `enabled` and cooldown; see [`super::evaluate_rule`].
    #[must_use]
    pub fn condition_met(&self, observation: &MetricObservation) -> bool {
        let value = observation.value();
        match self.condition {
            Condition::Above => value > self.threshold,
            Condition::Below => value < self.threshold,
            Condition::ChangeExceeds => observation
                .change_percent()
                .is_some_and(|change| change > self.threshold),
        }
    }
}

/// Builder for `GuardrailRule`.
#[derive(Debug)]
pub struct GuardrailRuleBuilder {
    rule: GuardrailRule,
}

impl GuardrailRuleBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        experiment_id: impl Into<String>,
        metric: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            rule: GuardrailRule {
                name: id.clone(),
                id,
                experiment_id: experiment_id.into(),
                metric: metric.into(),
                condition: Condition::Above,
                threshold: 0.0,
                unit: Unit::Absolute,
                action: Action::Alert,
                cooldown_hours: 0.0,
                enabled: true,
                last_triggered_at: None,
            },
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.rule.name = name.into();
        self
    }

    /// Set condition and threshold together.
    #[must_use]
    pub const fn when(mut self, condition: Condition, threshold: f64) -> Self {
        self.rule.condition = condition;
        self.rule.threshold = threshold;
        self
    }

    /// Set the threshold unit.
    #[must_use]
    pub const fn unit(mut self, unit: Unit) -> Self {
        self.rule.unit = unit;
        self
    }

    /// Set the action.
    #[must_use]
    pub const fn action(mut self, action: Action) -> Self {
        self.rule.action = action;
        self
    }

    /// Set the cooldown in hours.
    #[must_use]
    pub const fn cooldown_hours(mut self, hours: f64) -> Self {
        self.rule.cooldown_hours = hours;
        self
    }

    /// Enable or disable the rule.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.rule.enabled = enabled;
        self
    }

    /// Set a previous trigger time (useful for restoring state/testing).
    #[must_use]
    pub const fn last_triggered_at(mut self, at: DateTime<Utc>) -> Self {
        self.rule.last_triggered_at = Some(at);
        self
    }

    /// Build the `GuardrailRule`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRule`] if the rule breaks an invariant.
    pub fn build(self) -> Result<GuardrailRule> {
        self.rule.validate(None)?;
        Ok(self.rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(value: f64, previous: Option<f64>) -> MetricObservation {
        let base = MetricObservation::new("m", value, Utc::now());
        match previous {
            Some(p) => base.with_previous(p),
            None => base,
        }
    }

    #[test]
    fn test_builder_defaults() {
        let rule = GuardrailRule::builder("r1", "exp-1", "bounce_rate")
            .build()
            .unwrap();
        assert_eq!(rule.name(), "r1");
        assert_eq!(rule.action(), Action::Alert);
        assert!(rule.enabled());
        assert!(rule.last_triggered_at().is_none());
    }

    #[test]
    fn test_negative_cooldown_rejected() {
        let err = GuardrailRule::builder("r1", "exp-1", "m")
            .cooldown_hours(-1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let rule = GuardrailRule::builder("r1", "exp-1", "ghost").build().unwrap();
        let catalog = vec!["bounce_rate".to_string()];
        assert!(rule.validate(Some(&catalog)).is_err());
    }

    #[test]
    fn test_above_and_below_are_strict() {
        let above = GuardrailRule::builder("r", "e", "m")
            .when(Condition::Above, 65.0)
            .build()
            .unwrap();
        assert!(!above.condition_met(&obs(65.0, None)));
        assert!(above.condition_met(&obs(65.1, None)));

        let below = GuardrailRule::builder("r", "e", "m")
            .when(Condition::Below, 10.0)
            .build()
            .unwrap();
        assert!(!below.condition_met(&obs(10.0, None)));
        assert!(below.condition_met(&obs(9.9, None)));
    }

    #[test]
    fn test_change_exceeds_ignores_unit() {
        let rule = GuardrailRule::builder("r", "e", "m")
            .when(Condition::ChangeExceeds, 10.0)
            .unit(Unit::Absolute)
            .build()
            .unwrap();
        // 100 -> 111 is an 11% change
        assert!(rule.condition_met(&obs(111.0, Some(100.0))));
        // 100 -> 95 is a 5% change
        assert!(!rule.condition_met(&obs(95.0, Some(100.0))));
        // no previous value: never triggers
        assert!(!rule.condition_met(&obs(1_000.0, None)));
    }

    #[test]
    fn test_corrupt_json_is_surfaced() {
        let err = GuardrailRule::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::CorruptRule(_)));
    }

    #[test]
    fn test_json_round_trip_uses_snake_case() {
        let rule = GuardrailRule::builder("r1", "exp-1", "m")
            .when(Condition::ChangeExceeds, 5.0)
            .action(Action::Pause)
            .build()
            .unwrap();
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"change_exceeds\""));
        assert!(json.contains("\"pause\""));
        assert_eq!(GuardrailRule::from_json(&json).unwrap(), rule);
    }
}
