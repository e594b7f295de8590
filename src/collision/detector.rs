//! Pairwise collision detection

use std::cmp::Ordering;

use chrono::NaiveDate;

use super::{CollisionRecord, CollisionType, Severity};
use crate::experiment::ScheduledExperiment;

/// Stateless collision detector.
///
/// Run it on every schedule mutation: collisions are a structural property of
/// the schedule, not a time-varying signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionDetector;

impl CollisionDetector {
    /// Create a detector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Report every conflicting pair in `experiments`.
    #[must_use]
    pub fn detect(&self, experiments: &[ScheduledExperiment]) -> Vec<CollisionRecord> {
        detect_collisions(experiments)
    }
}

/// Report every conflicting pair in `experiments`.
///
/// Each unordered pair appears at most once, as `[lesser id, greater id]`;
/// entries sharing an ID are the same experiment and never collide. Output is
/// ordered by that ID pair.
#[must_use]
pub fn detect_collisions(experiments: &[ScheduledExperiment]) -> Vec<CollisionRecord> {
    let mut records = Vec::new();
    for (i, x) in experiments.iter().enumerate() {
        for y in &experiments[i + 1..] {
            let (a, b) = match x.id().cmp(y.id()) {
                Ordering::Less => (x, y),
                Ordering::Greater => (y, x),
                Ordering::Equal => continue,
            };
            if let Some(record) = classify_pair(a, b) {
                records.push(record);
            }
        }
    }
    records.sort_by(|l, r| l.experiment_ids.cmp(&r.experiment_ids));
    records
}

/// Classify one ordered pair (`a.id < b.id`).
pub(crate) fn classify_pair(
    a: &ScheduledExperiment,
    b: &ScheduledExperiment,
) -> Option<CollisionRecord> {
    if !a.overlaps(b) {
        return None;
    }
    let (from, to) = overlap_window(a, b);

    let (kind, severity, message) = if a.locale() == b.locale() {
        if a.audience_key() == b.audience_key() {
            (
                CollisionType::AudienceOverlap,
                Severity::Error,
                format!(
                    "'{}' and '{}' target the same audience '{}' in {} from {from} to {to}",
                    a.name(),
                    b.name(),
                    a.audience_key(),
                    a.locale()
                ),
            )
        } else {
            (
                CollisionType::TimingConflict,
                Severity::Warning,
                format!(
                    "'{}' and '{}' run concurrently in {} from {from} to {to}",
                    a.name(),
                    b.name(),
                    a.locale()
                ),
            )
        }
    } else {
        match (a.primary_metric(), b.primary_metric()) {
            (Some(ma), Some(mb)) if ma == mb => (
                CollisionType::MetricConflict,
                Severity::Warning,
                format!(
                    "'{}' and '{}' both move '{ma}' from {from} to {to}",
                    a.name(),
                    b.name()
                ),
            ),
            _ => return None,
        }
    };

    Some(CollisionRecord {
        experiment_ids: [a.id().to_string(), b.id().to_string()],
        kind,
        severity,
        message,
    })
}

fn overlap_window(a: &ScheduledExperiment, b: &ScheduledExperiment) -> (NaiveDate, NaiveDate) {
    (
        a.start_date().max(b.start_date()),
        a.end_date().min(b.end_date()),
    )
}
