//! Cooldown state machine and pure rule evaluation
//!
//! ```text
//!          condition true
//!   Idle ──────────────────> Cooldown { until = last + cooldown }
//!    ^                            │
//!    └──── now >= until ──────────┘
//! ```
//!
//! The state is never stored. It is derived from `last_triggered_at` on the
//! rule, so every evaluation worker sees the same machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Action, GuardrailRule, MetricObservation};

/// Cooldown state of a single rule at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    /// Next breach fires an action.
    Idle,
    /// Breaches are suppressed until `until`. `None` means the cooldown does
    /// not end in representable time.
    Cooldown {
        /// First instant at which the rule is idle again.
        until: Option<DateTime<Utc>>,
    },
}

impl CooldownState {
    /// Derive the state of `rule` at `now`.
    #[must_use]
    pub fn of(rule: &GuardrailRule, now: DateTime<Utc>) -> Self {
        let Some(last) = rule.last_triggered_at() else {
            return Self::Idle;
        };
        let until = rule
            .cooldown()
            .and_then(|cooldown| last.checked_add_signed(cooldown));
        match until {
            Some(until) if now >= until => Self::Idle,
            until => Self::Cooldown { until },
        }
    }

    /// Whether a breach right now would be suppressed.
    #[must_use]
    pub const fn is_cooling_down(self) -> bool {
        matches!(self, Self::Cooldown { .. })
    }
}

/// Result of evaluating one rule against one observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailEvaluation {
    /// Evaluated rule.
    pub rule_id: String,
    /// Whether the condition held on an enabled rule.
    pub triggered: bool,
    /// Whether the action was withheld because the rule is cooling down.
    pub suppressed_by_cooldown: bool,
    /// The rule's action (emitted only when triggered and not suppressed).
    pub action: Action,
    /// Timestamp of the observation that was evaluated.
    pub observed_at: DateTime<Utc>,
}

impl GuardrailEvaluation {
    /// Whether this evaluation asks the runtime to act.
    #[must_use]
    pub const fn requests_action(&self) -> bool {
        self.triggered && !self.suppressed_by_cooldown
    }
}

/// State change implied by an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Leave `last_triggered_at` untouched.
    Hold,
    /// Set `last_triggered_at = now` and emit the action (Idle -> Cooldown).
    Fire,
}

/// Evaluate `rule` against `observation` at `now` without touching any state.
///
/// A call at the exact instant the rule last fired is a replay of that firing:
/// it reports the same non-suppressed trigger but asks for no transition, so
/// repeating an evaluation never emits a second action.
#[must_use]
pub fn evaluate_rule(
    rule: &GuardrailRule,
    observation: &MetricObservation,
    now: DateTime<Utc>,
) -> (GuardrailEvaluation, Transition) {
    let evaluation = |triggered, suppressed_by_cooldown| GuardrailEvaluation {
        rule_id: rule.id().to_string(),
        triggered,
        suppressed_by_cooldown,
        action: rule.action(),
        observed_at: observation.observed_at(),
    };

    if !rule.enabled() || !rule.condition_met(observation) {
        return (evaluation(false, false), Transition::Hold);
    }

    if rule.last_triggered_at() == Some(now) {
        return (evaluation(true, false), Transition::Hold);
    }

    match CooldownState::of(rule, now) {
        CooldownState::Idle => (evaluation(true, false), Transition::Fire),
        CooldownState::Cooldown { .. } => (evaluation(true, true), Transition::Hold),
    }
}
