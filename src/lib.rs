//! # Trueno-Guard: Experiment Health & Decision Core
//!
//! **Version**: 0.1.0
//!
//! Trueno-Guard keeps growth experiments safe and decidable while they run:
//!
//! - [`guardrail`]: rule engine that alerts, pauses, or stops an experiment
//!   when a live metric crosses a threshold, with per-rule cooldown
//! - [`srm`]: chi-squared sample-ratio-mismatch check for broken randomization
//! - [`recommendation`]: ship/iterate/extend/stop call from statistical results
//! - [`collision`]: scheduling conflicts between experiments sharing a locale,
//!   audience, or primary metric
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: Guardrails stop the line automatically on a breach
//! - **Poka-Yoke safety**: Missing data skips a rule, never fires it
//! - **Heijunka**: Cooldown levels out repeated breaches into one action
//! - **Genchi Genbutsu**: SRM backed by a real test, not a static flag
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use trueno_guard::feed::MemoryMetricFeed;
//! use trueno_guard::guardrail::{Action, Condition, GuardrailRule};
//! use trueno_guard::monitor::HealthMonitor;
//! use trueno_guard::sink::RecordingSink;
//!
//! # fn main() -> trueno_guard::Result<()> {
//! let feed = Arc::new(MemoryMetricFeed::new());
//! let sink = Arc::new(RecordingSink::new());
//! let monitor = HealthMonitor::builder()
//!     .metric_feed(feed.clone())
//!     .action_sink(sink.clone())
//!     .build()?;
//!
//! monitor.add_rule(
//!     GuardrailRule::builder("bounce", "exp-001", "bounce_rate")
//!         .when(Condition::Above, 65.0)
//!         .action(Action::Pause)
//!         .cooldown_hours(24.0)
//!         .build()?,
//! )?;
//!
//! let now = Utc::now();
//! feed.record("exp-001", "bounce_rate", 70.0, now);
//! let report = monitor.evaluate_experiment("exp-001", now)?;
//! assert_eq!(report.fired().count(), 1);
//! assert_eq!(sink.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod collision;
pub mod config;
pub mod error;
pub mod experiment;
pub mod feed;
pub mod guardrail;
pub mod monitor;
pub mod recommendation;
pub mod sink;
pub mod srm;
pub mod stats;
pub mod store;
pub mod telemetry;

pub use error::{Error, Result};
