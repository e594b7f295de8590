//! Guardrail Engine - evaluates stored rules and claims trigger transitions

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{evaluate_rule, GuardrailEvaluation, GuardrailRule, MetricObservation, Transition};
use crate::feed::MetricFeed;
use crate::store::RuleStore;
use crate::{Error, Result};

/// Upper bound on re-reads after losing a trigger claim to another worker.
const MAX_CLAIM_ATTEMPTS: usize = 8;

/// Why a rule was not evaluated this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The feed has no current value for the rule's metric.
    NoObservation,
    /// The feed failed to answer.
    FeedError {
        /// Error reported by the feed.
        message: String,
    },
    /// The rule store failed while reading or claiming this rule.
    StoreError {
        /// Error reported by the store.
        message: String,
    },
}

/// A rule that could not be evaluated. Never carries an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEvaluation {
    /// Rule that was skipped.
    pub rule_id: String,
    /// Metric the rule watches.
    pub metric: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Outcome of asking the engine to evaluate one rule.
///
/// `Fired` and `Evaluated` carry identical evaluation records for the same
/// inputs; `Fired` additionally means this call performed the Idle -> Cooldown
/// transition and the caller owns dispatching the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// Triggered, claimed, action must be dispatched.
    Fired(GuardrailEvaluation),
    /// Evaluated without a state change (healthy, disabled, suppressed or replayed).
    Evaluated(GuardrailEvaluation),
    /// Not evaluated because data or the store was unavailable.
    Skipped(SkippedEvaluation),
}

impl EvaluationOutcome {
    /// The evaluation record, unless the rule was skipped.
    #[must_use]
    pub const fn evaluation(&self) -> Option<&GuardrailEvaluation> {
        match self {
            Self::Fired(evaluation) | Self::Evaluated(evaluation) => Some(evaluation),
            Self::Skipped(_) => None,
        }
    }

    /// Whether this call claimed the trigger.
    #[must_use]
    pub const fn fired(&self) -> bool {
        matches!(self, Self::Fired(_))
    }

    /// Whether the rule was skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Guardrail rule engine over a [`RuleStore`].
///
/// The engine itself is stateless; cooldown state is `last_triggered_at` in
/// the store, written only through compare-and-set. Any number of engines
/// (threads, processes) may share one store.
#[derive(Debug)]
pub struct GuardrailEngine<S> {
    store: S,
}

impl<S: RuleStore> GuardrailEngine<S> {
    /// Create an engine over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Get the backing rule store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Evaluate one stored rule against the latest observation at `now`.
    ///
    /// `observation` of `None`, or one for a different metric, skips the rule
    /// (fail safe: no action). A disabled rule is reported untriggered
    /// without needing data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRule`] if the store has no such rule, any
    /// store error, or [`Error::Other`] if the trigger claim keeps losing to
    /// concurrent writers.
    pub fn evaluate(
        &self,
        rule_id: &str,
        observation: Option<&MetricObservation>,
        now: DateTime<Utc>,
    ) -> Result<EvaluationOutcome> {
        for attempt in 1..=MAX_CLAIM_ATTEMPTS {
            let rule = self
                .store
                .get(rule_id)?
                .ok_or_else(|| Error::UnknownRule(rule_id.to_string()))?;

            if !rule.enabled() {
                return Ok(EvaluationOutcome::Evaluated(inactive(&rule, observation, now)));
            }

            let Some(observation) = observation.filter(|o| o.metric() == rule.metric()) else {
                warn!(rule_id, metric = rule.metric(), "no observation, skipping guardrail");
                return Ok(EvaluationOutcome::Skipped(SkippedEvaluation {
                    rule_id: rule_id.to_string(),
                    metric: rule.metric().to_string(),
                    reason: SkipReason::NoObservation,
                }));
            };

            let (evaluation, transition) = evaluate_rule(&rule, observation, now);
            match transition {
                Transition::Hold => {
                    if evaluation.suppressed_by_cooldown {
                        debug!(rule_id, action = %rule.action(), "breach suppressed by cooldown");
                    }
                    return Ok(EvaluationOutcome::Evaluated(evaluation));
                }
                Transition::Fire => {
                    if self.store.compare_and_set_last_triggered(
                        rule_id,
                        rule.last_triggered_at(),
                        now,
                    )? {
                        info!(
                            rule_id,
                            experiment_id = rule.experiment_id(),
                            metric = rule.metric(),
                            value = observation.value(),
                            threshold = rule.threshold(),
                            action = %rule.action(),
                            "guardrail triggered"
                        );
                        return Ok(EvaluationOutcome::Fired(evaluation));
                    }
                    debug!(rule_id, attempt, "lost trigger claim, re-reading rule");
                }
            }
        }

        Err(Error::Other(format!(
            "could not claim trigger for rule '{rule_id}' after {MAX_CLAIM_ATTEMPTS} attempts"
        )))
    }

    /// Evaluate every rule of an experiment, fetching each metric once.
    ///
    /// # Errors
    ///
    /// Returns store errors from loading the experiment's rules. Failures
    /// after that are reported per rule, see [`Self::evaluate_rules`].
    pub fn evaluate_experiment<F: MetricFeed + ?Sized>(
        &self,
        experiment_id: &str,
        feed: &F,
        now: DateTime<Utc>,
    ) -> Result<Vec<EvaluationOutcome>> {
        let rules = self.store.rules_for(experiment_id)?;
        Ok(self.evaluate_rules(&rules, experiment_id, feed, now))
    }

    /// Evaluate already loaded rules of one experiment.
    ///
    /// Never fails as a whole: a rule whose metric the feed cannot serve is
    /// skipped with [`SkipReason::FeedError`], a rule the store fails on is
    /// skipped with [`SkipReason::StoreError`], and rules deleted while the
    /// cycle runs are dropped. Triggers claimed before such a failure stay
    /// in the result as [`EvaluationOutcome::Fired`].
    #[must_use]
    pub fn evaluate_rules<F: MetricFeed + ?Sized>(
        &self,
        rules: &[GuardrailRule],
        experiment_id: &str,
        feed: &F,
        now: DateTime<Utc>,
    ) -> Vec<EvaluationOutcome> {
        let mut fetched: HashMap<&str, std::result::Result<Option<MetricObservation>, String>> =
            HashMap::new();
        let mut outcomes = Vec::with_capacity(rules.len());

        for rule in rules {
            if !rule.enabled() {
                outcomes.push(EvaluationOutcome::Evaluated(inactive(rule, None, now)));
                continue;
            }

            let latest = fetched.entry(rule.metric()).or_insert_with(|| {
                feed.latest(rule.metric(), experiment_id)
                    .map_err(|e| e.to_string())
            });

            let reason = match latest {
                Ok(observation) => match self.evaluate(rule.id(), observation.as_ref(), now) {
                    Ok(outcome) => {
                        outcomes.push(outcome);
                        continue;
                    }
                    Err(Error::UnknownRule(_)) => continue,
                    Err(e) => {
                        warn!(
                            rule_id = rule.id(),
                            metric = rule.metric(),
                            error = %e,
                            "rule store failed, skipping guardrail"
                        );
                        SkipReason::StoreError {
                            message: e.to_string(),
                        }
                    }
                },
                Err(message) => {
                    warn!(
                        rule_id = rule.id(),
                        metric = rule.metric(),
                        error = %message,
                        "metric feed failed, skipping guardrail"
                    );
                    SkipReason::FeedError {
                        message: message.clone(),
                    }
                }
            };
            outcomes.push(EvaluationOutcome::Skipped(SkippedEvaluation {
                rule_id: rule.id().to_string(),
                metric: rule.metric().to_string(),
                reason,
            }));
        }

        outcomes
    }
}

fn inactive(
    rule: &GuardrailRule,
    observation: Option<&MetricObservation>,
    now: DateTime<Utc>,
) -> GuardrailEvaluation {
    GuardrailEvaluation {
        rule_id: rule.id().to_string(),
        triggered: false,
        suppressed_by_cooldown: false,
        action: rule.action(),
        observed_at: observation.map_or(now, MetricObservation::observed_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::MemoryMetricFeed;
    use crate::guardrail::{Action, Condition};
    use crate::store::MemoryRuleStore;
    use chrono::{Duration, TimeZone};

    struct BrokenFeed;

    impl MetricFeed for BrokenFeed {
        fn latest(&self, _metric: &str, _experiment_id: &str) -> Result<Option<MetricObservation>> {
            Err(Error::Feed("connection reset".to_string()))
        }
    }

    /// Rule store whose reads of one rule fail.
    struct FailingReads {
        inner: MemoryRuleStore,
        failing_rule: &'static str,
    }

    impl RuleStore for FailingReads {
        fn insert(&self, rule: GuardrailRule) -> Result<()> {
            self.inner.insert(rule)
        }

        fn get(&self, rule_id: &str) -> Result<Option<GuardrailRule>> {
            if rule_id == self.failing_rule {
                return Err(Error::Other("replica unavailable".to_string()));
            }
            self.inner.get(rule_id)
        }

        fn remove(&self, rule_id: &str) -> Result<Option<GuardrailRule>> {
            self.inner.remove(rule_id)
        }

        fn rules_for(&self, experiment_id: &str) -> Result<Vec<GuardrailRule>> {
            self.inner.rules_for(experiment_id)
        }

        fn compare_and_set_last_triggered(
            &self,
            rule_id: &str,
            expected: Option<DateTime<Utc>>,
            new: DateTime<Utc>,
        ) -> Result<bool> {
            self.inner
                .compare_and_set_last_triggered(rule_id, expected, new)
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn engine() -> GuardrailEngine<MemoryRuleStore> {
        let store = MemoryRuleStore::new();
        store
            .insert(
                GuardrailRule::builder("bounce", "exp-1", "bounce_rate")
                    .when(Condition::Above, 65.0)
                    .action(Action::Pause)
                    .cooldown_hours(24.0)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        GuardrailEngine::new(store)
    }

    #[test]
    fn test_evaluate_fires_once_and_records_trigger() {
        let engine = engine();
        let obs = MetricObservation::new("bounce_rate", 70.0, t0());

        let outcome = engine.evaluate("bounce", Some(&obs), t0()).unwrap();
        assert!(outcome.fired());
        let rule = engine.store().get("bounce").unwrap().unwrap();
        assert_eq!(rule.last_triggered_at(), Some(t0()));
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let engine = engine();
        let obs = MetricObservation::new("bounce_rate", 70.0, t0());

        let first = engine.evaluate("bounce", Some(&obs), t0()).unwrap();
        let second = engine.evaluate("bounce", Some(&obs), t0()).unwrap();
        assert!(first.fired());
        assert!(!second.fired());
        assert_eq!(first.evaluation(), second.evaluation());
    }

    #[test]
    fn test_missing_observation_is_skipped() {
        let engine = engine();
        let outcome = engine.evaluate("bounce", None, t0()).unwrap();
        assert!(outcome.is_skipped());
        assert!(outcome.evaluation().is_none());

        let wrong_metric = MetricObservation::new("latency", 900.0, t0());
        let outcome = engine.evaluate("bounce", Some(&wrong_metric), t0()).unwrap();
        assert!(outcome.is_skipped());
        assert!(engine
            .store()
            .get("bounce")
            .unwrap()
            .unwrap()
            .last_triggered_at()
            .is_none());
    }

    #[test]
    fn test_unknown_rule() {
        let engine = engine();
        let err = engine.evaluate("ghost", None, t0()).unwrap_err();
        assert!(matches!(err, Error::UnknownRule(_)));
    }

    #[test]
    fn test_evaluate_experiment_feed_error_skips() {
        let engine = engine();
        let outcomes = engine.evaluate_experiment("exp-1", &BrokenFeed, t0()).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            &outcomes[0],
            EvaluationOutcome::Skipped(SkippedEvaluation {
                reason: SkipReason::FeedError { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_store_error_skips_rule_and_keeps_earlier_fire() {
        let inner = MemoryRuleStore::new();
        for (id, metric) in [("a-bounce", "bounce_rate"), ("b-latency", "latency_ms")] {
            inner
                .insert(
                    GuardrailRule::builder(id, "exp-1", metric)
                        .when(Condition::Above, 10.0)
                        .build()
                        .unwrap(),
                )
                .unwrap();
        }
        let engine = GuardrailEngine::new(FailingReads {
            inner,
            failing_rule: "b-latency",
        });
        let feed = MemoryMetricFeed::new();
        feed.record("exp-1", "bounce_rate", 70.0, t0());
        feed.record("exp-1", "latency_ms", 900.0, t0());

        let outcomes = engine.evaluate_experiment("exp-1", &feed, t0()).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].fired());
        match &outcomes[1] {
            EvaluationOutcome::Skipped(skipped) => {
                assert_eq!(skipped.rule_id, "b-latency");
                assert!(matches!(
                    &skipped.reason,
                    SkipReason::StoreError { message } if message.contains("replica unavailable")
                ));
            }
            other => panic!("expected skip, got {other:?}"),
        }
        assert!(engine
            .store()
            .inner
            .get("b-latency")
            .unwrap()
            .unwrap()
            .last_triggered_at()
            .is_none());
    }

    #[test]
    fn test_evaluate_experiment_uses_feed() {
        let engine = engine();
        let feed = MemoryMetricFeed::new();
        feed.record("exp-1", "bounce_rate", 70.0, t0());

        let outcomes = engine.evaluate_experiment("exp-1", &feed, t0()).unwrap();
        assert!(outcomes[0].fired());

        let later = t0() + Duration::hours(1);
        feed.record("exp-1", "bounce_rate", 71.0, later);
        let outcomes = engine.evaluate_experiment("exp-1", &feed, later).unwrap();
        let evaluation = outcomes[0].evaluation().unwrap();
        assert!(evaluation.suppressed_by_cooldown);
    }

    #[test]
    fn test_disabled_rule_needs_no_data() {
        let engine = engine();
        let mut rule = engine.store().get("bounce").unwrap().unwrap();
        rule.set_enabled(false);
        engine.store().insert(rule).unwrap();

        let outcomes = engine.evaluate_experiment("exp-1", &BrokenFeed, t0()).unwrap();
        let evaluation = outcomes[0].evaluation().unwrap();
        assert!(!evaluation.triggered);
        assert!(!evaluation.suppressed_by_cooldown);
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let outcome = EvaluationOutcome::Skipped(SkippedEvaluation {
            rule_id: "r".to_string(),
            metric: "m".to_string(),
            reason: SkipReason::NoObservation,
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["record"]["reason"]["kind"], "no_observation");

        let reason = SkipReason::StoreError {
            message: "timeout".to_string(),
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["kind"], "store_error");
        assert_eq!(json["message"], "timeout");
    }
}
