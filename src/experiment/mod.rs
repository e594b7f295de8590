//! Experiment Inputs
//!
//! Records describing an experiment as the health core sees it.
//!
//! ## Schema Overview
//!
//! ```text
//! ScheduledExperiment ──> CollisionDetector
//! VariantAllocation (N) ──> SrmChecker
//! ExperimentResults ──> RecommendationEngine
//!     ├── PrimaryMetric
//!     ├──< GuardrailMetric (N)
//!     └── SampleSize
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use trueno_guard::experiment::{ExperimentResults, PrimaryMetric, SampleSize, ScheduledExperiment};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
//! let scheduled = ScheduledExperiment::builder("exp-001", start, end)
//!     .locale("EU")
//!     .audience_key("new-users")
//!     .build()
//!     .unwrap();
//! assert!(scheduled.is_active_on(start));
//!
//! let results = ExperimentResults::new(
//!     PrimaryMetric::from_lift(19.4, true),
//!     SampleSize { actual: 49_300, expected: 50_000 },
//! );
//! assert_eq!(results.guardrail_metrics.len(), 0);
//! ```

mod allocation;
mod results;
mod schedule;

pub use allocation::VariantAllocation;
pub use results::{ExperimentResults, GuardrailMetric, GuardrailStatus, PrimaryMetric, SampleSize};
pub use schedule::{ScheduledExperiment, ScheduledExperimentBuilder};
