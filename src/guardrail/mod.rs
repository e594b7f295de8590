//! Guardrail Rule Engine
//!
//! Watches live metrics and asks the experiment runtime to alert, pause, or
//! stop an experiment when a safety threshold is crossed. A per-rule cooldown
//! keeps repeated breaches from spamming actions.
//!
//! ## Layers
//!
//! - [`evaluate_rule`]: pure, no I/O, no state
//! - [`GuardrailEngine`]: reads rules from a [`crate::store::RuleStore`] and
//!   claims the Idle -> Cooldown transition atomically
//!
//! ## Usage
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use trueno_guard::guardrail::{Action, Condition, GuardrailEngine, GuardrailRule, MetricObservation};
//! use trueno_guard::store::{MemoryRuleStore, RuleStore};
//!
//! # fn example() -> trueno_guard::Result<()> {
//! let store = MemoryRuleStore::new();
//! store.insert(
//!     GuardrailRule::builder("bounce", "exp-1", "bounce_rate")
//!         .when(Condition::Above, 65.0)
//!         .action(Action::Pause)
//!         .cooldown_hours(24.0)
//!         .build()?,
//! )?;
//! let engine = GuardrailEngine::new(store);
//!
//! let t0 = Utc::now();
//! let breach = MetricObservation::new("bounce_rate", 70.0, t0);
//! assert!(engine.evaluate("bounce", Some(&breach), t0)?.fired());
//!
//! let t1 = t0 + Duration::hours(2);
//! let again = MetricObservation::new("bounce_rate", 72.0, t1);
//! let outcome = engine.evaluate("bounce", Some(&again), t1)?;
//! assert!(outcome.evaluation().unwrap().suppressed_by_cooldown);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod cooldown;
mod engine;
mod observation;
mod rule;

pub use cooldown::{evaluate_rule, CooldownState, GuardrailEvaluation, Transition};
pub use engine::{EvaluationOutcome, GuardrailEngine, SkipReason, SkippedEvaluation};
pub use observation::MetricObservation;
pub use rule::{Action, Condition, GuardrailRule, GuardrailRuleBuilder, Unit};
