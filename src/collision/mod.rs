//! Collision Detector
//!
//! Flags experiments whose schedules and targeting overlap enough to
//! interfere with each other's measurement.
//!
//! | Same locale | Same audience | Same primary metric | Record                       |
//! |-------------|---------------|---------------------|------------------------------|
//! | yes         | yes           | -                   | `audience_overlap` / error   |
//! | yes         | no            | -                   | `timing_conflict` / warning  |
//! | no          | -             | yes                 | `metric_conflict` / warning  |
//!
//! Only pairs whose inclusive date ranges overlap are considered.

mod calendar;
mod detector;

pub use calendar::{daily_collisions, DayCollisions};
pub use detector::{detect_collisions, CollisionDetector};

use serde::{Deserialize, Serialize};

/// Kind of conflict between two experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionType {
    /// Same locale and same audience.
    AudienceOverlap,
    /// Both experiments optimize the same primary metric.
    MetricConflict,
    /// Same locale, different audience.
    TimingConflict,
}

/// How urgently a collision needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Likely interference; review.
    Warning,
    /// Measurement is compromised; escalate.
    Error,
}

/// A conflicting pair of experiments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionRecord {
    /// `[lesser id, greater id]`.
    pub experiment_ids: [String; 2],
    /// Kind of conflict.
    #[serde(rename = "type")]
    pub kind: CollisionType,
    /// Severity.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}
