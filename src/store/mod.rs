//! Repository Module for guardrail rules and the experiment schedule
//!
//! Engines hold no persistent state. Rules (including the per-rule
//! `last_triggered_at`) and the schedule live behind these traits so that
//! several evaluation workers stay consistent.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use trueno_guard::guardrail::GuardrailRule;
//! use trueno_guard::store::{MemoryRuleStore, RuleStore};
//!
//! # fn example() -> trueno_guard::Result<()> {
//! let store = MemoryRuleStore::new();
//! store.insert(GuardrailRule::builder("r1", "exp-1", "bounce_rate").build()?)?;
//!
//! let now = Utc::now();
//! assert!(store.compare_and_set_last_triggered("r1", None, now)?);
//! // Second claim with a stale expectation loses.
//! assert!(!store.compare_and_set_last_triggered("r1", None, now)?);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod memory;

pub use memory::{MemoryRuleStore, MemoryScheduleStore};

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::experiment::ScheduledExperiment;
use crate::guardrail::GuardrailRule;
use crate::Result;

/// Persistence for guardrail rules.
pub trait RuleStore: Send + Sync {
    /// Insert or replace a rule.
    ///
    /// Implementations must reject invalid rules with
    /// [`crate::Error::InvalidRule`] so they never reach evaluation.
    ///
    /// Replacing an existing rule keeps its stored `last_triggered_at`, read
    /// and written atomically with the replacement. Editing a rule's
    /// threshold or name must not reopen a running cooldown.
    fn insert(&self, rule: GuardrailRule) -> Result<()>;

    /// Get a rule by ID.
    fn get(&self, rule_id: &str) -> Result<Option<GuardrailRule>>;

    /// Remove a rule, returning it if it existed.
    fn remove(&self, rule_id: &str) -> Result<Option<GuardrailRule>>;

    /// All rules guarding an experiment, ordered by rule ID.
    fn rules_for(&self, experiment_id: &str) -> Result<Vec<GuardrailRule>>;

    /// Atomically set `last_triggered_at = new` if it currently equals
    /// `expected`.
    ///
    /// Returns `false` when another evaluation changed it first. This is the
    /// only write path the engine uses.
    fn compare_and_set_last_triggered(
        &self,
        rule_id: &str,
        expected: Option<DateTime<Utc>>,
        new: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Persistence for the experiment calendar.
pub trait ScheduleStore: Send + Sync {
    /// Insert or replace a scheduled experiment.
    fn upsert(&self, experiment: ScheduledExperiment) -> Result<()>;

    /// Remove a scheduled experiment, returning it if it existed.
    fn remove(&self, experiment_id: &str) -> Result<Option<ScheduledExperiment>>;

    /// All scheduled experiments, ordered by ID.
    fn list_active(&self) -> Result<Vec<ScheduledExperiment>>;
}

impl<T: RuleStore + ?Sized> RuleStore for Arc<T> {
    fn insert(&self, rule: GuardrailRule) -> Result<()> {
        (**self).insert(rule)
    }

    fn get(&self, rule_id: &str) -> Result<Option<GuardrailRule>> {
        (**self).get(rule_id)
    }

    fn remove(&self, rule_id: &str) -> Result<Option<GuardrailRule>> {
        (**self).remove(rule_id)
    }

    fn rules_for(&self, experiment_id: &str) -> Result<Vec<GuardrailRule>> {
        (**self).rules_for(experiment_id)
    }

    fn compare_and_set_last_triggered(
        &self,
        rule_id: &str,
        expected: Option<DateTime<Utc>>,
        new: DateTime<Utc>,
    ) -> Result<bool> {
        (**self).compare_and_set_last_triggered(rule_id, expected, new)
    }
}

impl<T: ScheduleStore + ?Sized> ScheduleStore for Arc<T> {
    fn upsert(&self, experiment: ScheduledExperiment) -> Result<()> {
        (**self).upsert(experiment)
    }

    fn remove(&self, experiment_id: &str) -> Result<Option<ScheduledExperiment>> {
        (**self).remove(experiment_id)
    }

    fn list_active(&self) -> Result<Vec<ScheduledExperiment>> {
        (**self).list_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::Condition;
    use crate::Error;
    use chrono::{Duration, NaiveDate};

    fn rule(id: &str, experiment_id: &str) -> GuardrailRule {
        GuardrailRule::builder(id, experiment_id, "bounce_rate")
            .when(Condition::Above, 65.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_rule_store_insert_get() {
        let store = MemoryRuleStore::new();
        store.insert(rule("r1", "exp-1")).unwrap();

        let fetched = store.get("r1").unwrap().unwrap();
        assert_eq!(fetched.metric(), "bounce_rate");
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_rule_store_rules_for_is_sorted_and_scoped() {
        let store = MemoryRuleStore::new();
        store.insert(rule("r2", "exp-1")).unwrap();
        store.insert(rule("r1", "exp-1")).unwrap();
        store.insert(rule("r3", "exp-2")).unwrap();

        let ids: Vec<_> = store
            .rules_for("exp-1")
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_rule_store_catalog_validation() {
        let store = MemoryRuleStore::with_catalog(vec!["conversion".to_string()]);
        let err = store.insert(rule("r1", "exp-1")).unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_rule_store_insert_json_rejects_corrupt_definition() {
        let store = MemoryRuleStore::new();
        let err = store.insert_json("{\"id\": 42}").unwrap_err();
        assert!(matches!(err, Error::CorruptRule(_)));
    }

    #[test]
    fn test_compare_and_set() {
        let store = MemoryRuleStore::new();
        store.insert(rule("r1", "exp-1")).unwrap();
        let t0 = Utc::now();
        let t1 = t0 + Duration::hours(1);

        assert!(store.compare_and_set_last_triggered("r1", None, t0).unwrap());
        assert!(!store.compare_and_set_last_triggered("r1", None, t1).unwrap());
        assert!(store
            .compare_and_set_last_triggered("r1", Some(t0), t1)
            .unwrap());
        assert_eq!(store.get("r1").unwrap().unwrap().last_triggered_at(), Some(t1));
    }

    #[test]
    fn test_compare_and_set_unknown_rule() {
        let store = MemoryRuleStore::new();
        let err = store
            .compare_and_set_last_triggered("ghost", None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownRule(_)));
    }

    #[test]
    fn test_replacing_rule_keeps_last_triggered() {
        let store = MemoryRuleStore::new();
        store.insert(rule("r1", "exp-1")).unwrap();
        let t0 = Utc::now();
        assert!(store.compare_and_set_last_triggered("r1", None, t0).unwrap());

        let edited = GuardrailRule::builder("r1", "exp-1", "bounce_rate")
            .name("tighter bounce ceiling")
            .when(Condition::Above, 60.0)
            .build()
            .unwrap();
        assert!(edited.last_triggered_at().is_none());
        store.insert(edited).unwrap();

        let stored = store.get("r1").unwrap().unwrap();
        assert_eq!(stored.name(), "tighter bounce ceiling");
        assert!((stored.threshold() - 60.0).abs() < f64::EPSILON);
        assert_eq!(stored.last_triggered_at(), Some(t0));

        // a stale timestamp on the edit does not win either
        let stale = GuardrailRule::builder("r1", "exp-1", "bounce_rate")
            .last_triggered_at(t0 - Duration::days(3))
            .build()
            .unwrap();
        store.insert(stale).unwrap();
        assert_eq!(store.get("r1").unwrap().unwrap().last_triggered_at(), Some(t0));
    }

    #[test]
    fn test_new_rule_keeps_restored_last_triggered() {
        let store = MemoryRuleStore::new();
        let t0 = Utc::now();
        let restored = GuardrailRule::builder("r1", "exp-1", "bounce_rate")
            .last_triggered_at(t0)
            .build()
            .unwrap();
        store.insert(restored).unwrap();
        assert_eq!(store.get("r1").unwrap().unwrap().last_triggered_at(), Some(t0));
    }

    #[test]
    fn test_schedule_store_round_trip() {
        let store = MemoryScheduleStore::new();
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        store
            .upsert(ScheduledExperiment::builder("b", day(1), day(2)).build().unwrap())
            .unwrap();
        store
            .upsert(ScheduledExperiment::builder("a", day(1), day(2)).build().unwrap())
            .unwrap();

        let ids: Vec<_> = store
            .list_active()
            .unwrap()
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(store.remove("a").unwrap().is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_set_concurrent_single_winner() {
        let store = Arc::new(MemoryRuleStore::new());
        store.insert(rule("r1", "exp-1")).unwrap();
        let now = Utc::now();

        let mut handles = vec![];
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.compare_and_set_last_triggered("r1", None, now).unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
