//! Day-level collision calendar

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{detect_collisions, CollisionRecord, Severity};
use crate::experiment::ScheduledExperiment;
use crate::{Error, Result};

/// One calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCollisions {
    /// The day.
    pub date: NaiveDate,
    /// IDs of experiments running that day, sorted.
    pub active: Vec<String>,
    /// One representative conflicting pair active that day, if any.
    pub conflict: Option<CollisionRecord>,
}

/// Build a day-by-day view over `from..=to`.
///
/// The representative conflict is the first `error` pair (in ID-pair order)
/// active that day, otherwise the first `warning` pair.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `from` is after `to`.
pub fn daily_collisions(
    experiments: &[ScheduledExperiment],
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DayCollisions>> {
    if from > to {
        return Err(Error::InvalidInput(format!(
            "calendar range start {from} is after end {to}"
        )));
    }

    let records = detect_collisions(experiments);
    let mut by_id: FxHashMap<&str, &ScheduledExperiment> = FxHashMap::default();
    for experiment in experiments {
        by_id.entry(experiment.id()).or_insert(experiment);
    }

    let days = from.iter_days().take_while(|day| *day <= to);
    Ok(days
        .map(|date| {
            let mut active: Vec<String> = by_id
                .values()
                .filter(|e| e.is_active_on(date))
                .map(|e| e.id().to_string())
                .collect();
            active.sort();

            let live = |record: &&CollisionRecord| {
                record
                    .experiment_ids
                    .iter()
                    .all(|id| by_id.get(id.as_str()).is_some_and(|e| e.is_active_on(date)))
            };
            let conflict = records
                .iter()
                .filter(live)
                .find(|r| r.severity == Severity::Error)
                .or_else(|| records.iter().find(live))
                .cloned();

            DayCollisions {
                date,
                active,
                conflict,
            }
        })
        .collect())
}
