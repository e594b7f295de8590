//! In-memory repositories using `DashMap`.
//!
//! This is the default backend - data is lost on process restart.
//! Hosts with a database implement [`RuleStore`]/[`ScheduleStore`] themselves.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{RuleStore, ScheduleStore};
use crate::experiment::ScheduledExperiment;
use crate::guardrail::GuardrailRule;
use crate::{Error, Result};

/// In-memory rule repository.
///
/// Compare-and-set runs under the `DashMap` shard lock for the rule's entry,
/// so concurrent claims on one rule are serialized while other rules proceed.
pub struct MemoryRuleStore {
    rules: DashMap<String, GuardrailRule>,
    catalog: Option<Vec<String>>,
}

impl MemoryRuleStore {
    /// Create a store that accepts any metric name.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: DashMap::new(),
            catalog: None,
        }
    }

    /// Create a store that rejects rules on metrics outside `known_metrics`.
    #[must_use]
    pub fn with_catalog(known_metrics: Vec<String>) -> Self {
        Self {
            rules: DashMap::new(),
            catalog: Some(known_metrics),
        }
    }

    /// Parse and insert a persisted rule definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptRule`] for unreadable JSON and
    /// [`Error::InvalidRule`] for a rule that breaks an invariant.
    pub fn insert_json(&self, json: &str) -> Result<()> {
        self.insert(GuardrailRule::from_json(json)?)
    }

    /// Get the number of rules in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for MemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleStore for MemoryRuleStore {
    fn insert(&self, mut rule: GuardrailRule) -> Result<()> {
        rule.validate(self.catalog.as_deref())?;
        // last_triggered_at belongs to the engine; an edit keeps the stored value
        match self.rules.entry(rule.id().to_string()) {
            Entry::Occupied(mut stored) => {
                rule.set_last_triggered_at(stored.get().last_triggered_at());
                stored.insert(rule);
            }
            Entry::Vacant(slot) => {
                slot.insert(rule);
            }
        }
        Ok(())
    }

    fn get(&self, rule_id: &str) -> Result<Option<GuardrailRule>> {
        Ok(self.rules.get(rule_id).map(|r| r.value().clone()))
    }

    fn remove(&self, rule_id: &str) -> Result<Option<GuardrailRule>> {
        Ok(self.rules.remove(rule_id).map(|(_, rule)| rule))
    }

    fn rules_for(&self, experiment_id: &str) -> Result<Vec<GuardrailRule>> {
        let mut rules: Vec<GuardrailRule> = self
            .rules
            .iter()
            .filter(|r| r.experiment_id() == experiment_id)
            .map(|r| r.value().clone())
            .collect();
        rules.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(rules)
    }

    fn compare_and_set_last_triggered(
        &self,
        rule_id: &str,
        expected: Option<DateTime<Utc>>,
        new: DateTime<Utc>,
    ) -> Result<bool> {
        let mut entry = self
            .rules
            .get_mut(rule_id)
            .ok_or_else(|| Error::UnknownRule(rule_id.to_string()))?;
        if entry.last_triggered_at() != expected {
            return Ok(false);
        }
        entry.set_last_triggered_at(Some(new));
        Ok(true)
    }
}

/// In-memory schedule repository.
pub struct MemoryScheduleStore {
    experiments: DashMap<String, ScheduledExperiment>,
}

impl MemoryScheduleStore {
    /// Create an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self {
            experiments: DashMap::new(),
        }
    }

    /// Get the number of scheduled experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Check if the schedule is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

impl Default for MemoryScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn upsert(&self, experiment: ScheduledExperiment) -> Result<()> {
        experiment.validate()?;
        self.experiments
            .insert(experiment.id().to_string(), experiment);
        Ok(())
    }

    fn remove(&self, experiment_id: &str) -> Result<Option<ScheduledExperiment>> {
        Ok(self.experiments.remove(experiment_id).map(|(_, e)| e))
    }

    fn list_active(&self) -> Result<Vec<ScheduledExperiment>> {
        let mut experiments: Vec<ScheduledExperiment> =
            self.experiments.iter().map(|e| e.value().clone()).collect();
        experiments.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(experiments)
    }
}
