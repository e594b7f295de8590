//! Metric feed collaborator
//!
//! The health core only ever asks for the newest value of a metric. Timeouts
//! and retries are the feed's business; an `Err` from [`MetricFeed::latest`]
//! makes the engine skip the affected rules for the cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::guardrail::MetricObservation;
use crate::Result;

/// Source of live metric values.
pub trait MetricFeed: Send + Sync {
    /// Newest observation of `metric` for `experiment_id`, if any exists.
    fn latest(&self, metric: &str, experiment_id: &str) -> Result<Option<MetricObservation>>;
}

impl<T: MetricFeed + ?Sized> MetricFeed for Arc<T> {
    fn latest(&self, metric: &str, experiment_id: &str) -> Result<Option<MetricObservation>> {
        (**self).latest(metric, experiment_id)
    }
}

/// In-memory feed keyed by `(experiment_id, metric)`.
///
/// Recording a value keeps the value it replaces as `previous_value`, which is
/// what `change_exceeds` rules compare against.
pub struct MemoryMetricFeed {
    latest: DashMap<(String, String), MetricObservation>,
}

impl MemoryMetricFeed {
    /// Create an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            latest: DashMap::new(),
        }
    }

    /// Record a new value, returning the observation now served.
    pub fn record(
        &self,
        experiment_id: &str,
        metric: &str,
        value: f64,
        observed_at: DateTime<Utc>,
    ) -> MetricObservation {
        let key = (experiment_id.to_string(), metric.to_string());
        match self.latest.entry(key) {
            Entry::Occupied(mut occupied) => {
                let observation = MetricObservation::new(metric, value, observed_at)
                    .with_previous(occupied.get().value());
                occupied.insert(observation.clone());
                observation
            }
            Entry::Vacant(vacant) => {
                let observation = MetricObservation::new(metric, value, observed_at);
                vacant.insert(observation.clone());
                observation
            }
        }
    }

    /// Replace the served observation as-is.
    pub fn set(&self, experiment_id: &str, observation: MetricObservation) {
        self.latest.insert(
            (experiment_id.to_string(), observation.metric().to_string()),
            observation,
        );
    }

    /// Forget all values for an experiment.
    pub fn clear_experiment(&self, experiment_id: &str) {
        self.latest.retain(|(exp, _), _| exp != experiment_id);
    }
}

impl Default for MemoryMetricFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricFeed for MemoryMetricFeed {
    fn latest(&self, metric: &str, experiment_id: &str) -> Result<Option<MetricObservation>> {
        Ok(self
            .latest
            .get(&(experiment_id.to_string(), metric.to_string()))
            .map(|o| o.value().clone()))
    }
}
