//! Health Monitor - wires stores, feed, sink and the four engines together
//!
//! The monitor is what a host scheduler drives: one [`HealthMonitor::run_cycle`]
//! per metric batch, [`HealthMonitor::upsert_schedule`] on every calendar edit,
//! [`HealthMonitor::recommend`] whenever results are refreshed. It owns no
//! loop and no timer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::collision::{daily_collisions, detect_collisions, CollisionRecord, DayCollisions};
use crate::config::HealthConfig;
use crate::experiment::{ExperimentResults, ScheduledExperiment, VariantAllocation};
use crate::feed::{MemoryMetricFeed, MetricFeed};
use crate::guardrail::{EvaluationOutcome, GuardrailEngine, GuardrailEvaluation, GuardrailRule};
use crate::recommendation::{recommend, Recommendation};
use crate::sink::{ActionSink, HealthEvent, TracingSink};
use crate::srm::{SrmChecker, SrmReport};
use crate::store::{MemoryRuleStore, MemoryScheduleStore, RuleStore, ScheduleStore};
use crate::Result;

/// Guardrail outcomes for one experiment in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Evaluated experiment.
    pub experiment_id: String,
    /// One outcome per rule, ordered by rule ID.
    pub outcomes: Vec<EvaluationOutcome>,
}

impl CycleReport {
    /// Evaluations whose action was dispatched by this cycle.
    pub fn fired(&self) -> impl Iterator<Item = &GuardrailEvaluation> {
        self.outcomes.iter().filter_map(|o| match o {
            EvaluationOutcome::Fired(evaluation) => Some(evaluation),
            _ => None,
        })
    }

    /// Breaches withheld by cooldown.
    pub fn suppressed(&self) -> impl Iterator<Item = &GuardrailEvaluation> {
        self.outcomes
            .iter()
            .filter_map(EvaluationOutcome::evaluation)
            .filter(|e| e.suppressed_by_cooldown)
    }

    /// Number of rules skipped for lack of data.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }
}

/// Experiment health monitor.
pub struct HealthMonitor {
    engine: GuardrailEngine<Arc<dyn RuleStore>>,
    schedule: Arc<dyn ScheduleStore>,
    feed: Arc<dyn MetricFeed>,
    sink: Arc<dyn ActionSink>,
    srm: SrmChecker,
    config: HealthConfig,
}

impl HealthMonitor {
    /// Create a monitor builder.
    #[must_use]
    pub fn builder() -> HealthMonitorBuilder {
        HealthMonitorBuilder::default()
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Get the rule store.
    #[must_use]
    pub fn rules(&self) -> &dyn RuleStore {
        &**self.engine.store()
    }

    /// Get the schedule store.
    #[must_use]
    pub fn schedule(&self) -> &dyn ScheduleStore {
        &*self.schedule
    }

    /// Save a rule after checking it against the configured metric catalog.
    ///
    /// Replacing an existing rule keeps its cooldown.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRule`] for a rule that breaks an
    /// invariant, plus any store error.
    pub fn add_rule(&self, rule: GuardrailRule) -> Result<()> {
        rule.validate(self.config.known_metrics.as_deref())?;
        self.rules().insert(rule)
    }

    /// Parse and save a persisted rule definition.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CorruptRule`] for unreadable JSON, otherwise as
    /// [`Self::add_rule`].
    pub fn add_rule_json(&self, json: &str) -> Result<()> {
        self.add_rule(GuardrailRule::from_json(json)?)
    }

    /// Evaluate every guardrail of one experiment and dispatch fired actions.
    ///
    /// Once the experiment's rules are loaded, every claimed trigger is
    /// dispatched; later per-rule store failures only skip their own rule.
    ///
    /// # Errors
    ///
    /// Returns rule store errors from loading the experiment's rules.
    pub fn evaluate_experiment(
        &self,
        experiment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CycleReport> {
        let rules = self.rules().rules_for(experiment_id)?;
        let outcomes = self
            .engine
            .evaluate_rules(&rules, experiment_id, &*self.feed, now);

        let names: HashMap<&str, &str> = rules.iter().map(|r| (r.id(), r.name())).collect();
        for outcome in &outcomes {
            if let EvaluationOutcome::Fired(evaluation) = outcome {
                let rule_name = names
                    .get(evaluation.rule_id.as_str())
                    .map_or_else(|| evaluation.rule_id.clone(), |name| (*name).to_string());
                self.sink.dispatch(HealthEvent::GuardrailTriggered {
                    experiment_id: experiment_id.to_string(),
                    rule_name,
                    evaluation: evaluation.clone(),
                });
            }
        }

        let report = CycleReport {
            experiment_id: experiment_id.to_string(),
            outcomes,
        };
        debug!(
            experiment_id,
            rules = report.outcomes.len(),
            fired = report.fired().count(),
            skipped = report.skipped_count(),
            "guardrail cycle complete"
        );
        Ok(report)
    }

    /// Evaluate several experiments; results are in input order.
    ///
    /// Experiments share no mutable state, so with the `rayon` feature and
    /// `config.parallel` they run concurrently.
    #[must_use]
    pub fn run_cycle(
        &self,
        experiment_ids: &[String],
        now: DateTime<Utc>,
    ) -> Vec<Result<CycleReport>> {
        #[cfg(feature = "rayon")]
        if self.config.parallel {
            use rayon::prelude::*;
            return experiment_ids
                .par_iter()
                .map(|id| self.evaluate_experiment(id, now))
                .collect();
        }

        experiment_ids
            .iter()
            .map(|id| self.evaluate_experiment(id, now))
            .collect()
    }

    /// Run the SRM check for one experiment; a mismatch is dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidAllocation`] for a malformed allocation.
    pub fn check_srm(
        &self,
        experiment_id: &str,
        allocations: &[VariantAllocation],
    ) -> Result<SrmReport> {
        let report = self.srm.check_srm(allocations)?;
        if report.mismatched {
            self.sink.dispatch(HealthEvent::SrmMismatch {
                experiment_id: experiment_id.to_string(),
                report,
            });
        } else if let Some(reason) = report.insufficient_data {
            debug!(experiment_id, %reason, "SRM check inconclusive");
        }
        Ok(report)
    }

    /// Score results and dispatch the recommendation.
    pub fn recommend(&self, experiment_id: &str, results: &ExperimentResults) -> Recommendation {
        let recommendation = recommend(results);
        self.sink.dispatch(HealthEvent::Recommendation {
            experiment_id: experiment_id.to_string(),
            recommendation: recommendation.clone(),
        });
        recommendation
    }

    /// All collisions in the current schedule.
    ///
    /// # Errors
    ///
    /// Returns schedule store errors.
    pub fn collisions(&self) -> Result<Vec<CollisionRecord>> {
        Ok(detect_collisions(&self.schedule.list_active()?))
    }

    /// Day-by-day collision view over `from..=to`.
    ///
    /// # Errors
    ///
    /// Returns schedule store errors and [`crate::Error::InvalidInput`] for an
    /// inverted range.
    pub fn calendar(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DayCollisions>> {
        daily_collisions(&self.schedule.list_active()?, from, to)
    }

    /// Create or edit a scheduled experiment and re-run collision detection.
    ///
    /// Collisions involving the edited experiment are dispatched; the full
    /// list is returned.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidSchedule`] and schedule store errors.
    pub fn upsert_schedule(&self, experiment: ScheduledExperiment) -> Result<Vec<CollisionRecord>> {
        let experiment_id = experiment.id().to_string();
        self.schedule.upsert(experiment)?;
        let records = self.collisions()?;
        for record in records
            .iter()
            .filter(|r| r.experiment_ids.iter().any(|id| *id == experiment_id))
        {
            self.sink.dispatch(HealthEvent::Collision(record.clone()));
        }
        info!(
            experiment_id = %experiment_id,
            collisions = records.len(),
            "schedule updated"
        );
        Ok(records)
    }

    /// Remove a scheduled experiment and re-run collision detection.
    ///
    /// # Errors
    ///
    /// Returns schedule store errors.
    pub fn remove_schedule(&self, experiment_id: &str) -> Result<Vec<CollisionRecord>> {
        self.schedule.remove(experiment_id)?;
        let records = self.collisions()?;
        info!(experiment_id, collisions = records.len(), "schedule entry removed");
        Ok(records)
    }
}

/// Builder for `HealthMonitor`.
#[derive(Default)]
pub struct HealthMonitorBuilder {
    rules: Option<Arc<dyn RuleStore>>,
    schedule: Option<Arc<dyn ScheduleStore>>,
    feed: Option<Arc<dyn MetricFeed>>,
    sink: Option<Arc<dyn ActionSink>>,
    config: HealthConfig,
}

impl HealthMonitorBuilder {
    /// Use a host rule store (default: in-memory).
    #[must_use]
    pub fn rule_store(mut self, store: Arc<dyn RuleStore>) -> Self {
        self.rules = Some(store);
        self
    }

    /// Use a host schedule store (default: in-memory).
    #[must_use]
    pub fn schedule_store(mut self, store: Arc<dyn ScheduleStore>) -> Self {
        self.schedule = Some(store);
        self
    }

    /// Use a metric feed (default: empty in-memory feed).
    #[must_use]
    pub fn metric_feed(mut self, feed: Arc<dyn MetricFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Use an action sink (default: [`TracingSink`]).
    #[must_use]
    pub fn action_sink(mut self, sink: Arc<dyn ActionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: HealthConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the monitor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] for an invalid configuration.
    pub fn build(self) -> Result<HealthMonitor> {
        self.config.validate()?;
        let rules = self.rules.unwrap_or_else(|| match &self.config.known_metrics {
            Some(catalog) => Arc::new(MemoryRuleStore::with_catalog(catalog.clone())),
            None => Arc::new(MemoryRuleStore::new()),
        });
        let srm = SrmChecker::new(self.config.srm_alpha)
            .with_allocation_tolerance(self.config.allocation_tolerance);

        Ok(HealthMonitor {
            engine: GuardrailEngine::new(rules),
            schedule: self
                .schedule
                .unwrap_or_else(|| Arc::new(MemoryScheduleStore::new())),
            feed: self.feed.unwrap_or_else(|| Arc::new(MemoryMetricFeed::new())),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            srm,
            config: self.config,
        })
    }
}
