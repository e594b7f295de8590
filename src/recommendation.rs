//! Recommendation Engine - turns experiment results into a ship/iterate/extend/stop call
//!
//! Deterministic additive scoring from a neutral 50. This is a heuristic, not
//! a decision procedure: the deltas and breakpoints below ARE the contract,
//! and changing any of them changes historical recommendations.
//!
//! | Rule                                   | Delta |
//! |----------------------------------------|-------|
//! | significant and positive lift          | +30   |
//! | not significant                        | -20   |
//! | any failed guardrail (once)            | -40   |
//! | any warning guardrail (once)           | -10   |
//! | sample size below 80% of target        | -15   |
//!
//! | Score   | Type    | Confidence       |
//! |---------|---------|------------------|
//! | >= 70   | ship    | min(score, 95)   |
//! | >= 40   | iterate | 60               |
//! | >= 20   | extend  | 50               |
//! | else    | stop    | \|score - 50\|   |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::experiment::{ExperimentResults, GuardrailStatus};

const NEUTRAL_SCORE: i32 = 50;
const SIGNIFICANT_WIN_BONUS: i32 = 30;
const NOT_SIGNIFICANT_PENALTY: i32 = 20;
const FAILED_GUARDRAIL_PENALTY: i32 = 40;
const WARNING_GUARDRAIL_PENALTY: i32 = 10;
const UNDERPOWERED_PENALTY: i32 = 15;
const MIN_SAMPLE_RATIO: f64 = 0.8;

const SHIP_AT: i32 = 70;
const ITERATE_AT: i32 = 40;
const EXTEND_AT: i32 = 20;
const MAX_SHIP_CONFIDENCE: i32 = 95;
const ITERATE_CONFIDENCE: u8 = 60;
const EXTEND_CONFIDENCE: u8 = 50;

/// Categorical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    /// Roll the treatment out.
    Ship,
    /// Promising but needs another iteration.
    Iterate,
    /// Keep running to gather more data.
    Extend,
    /// End the experiment.
    Stop,
}

impl fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ship => write!(f, "ship"),
            Self::Iterate => write!(f, "iterate"),
            Self::Extend => write!(f, "extend"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Scored recommendation. Always recomputable from the results it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// The call.
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    /// Confidence in the call, 0-100.
    pub confidence: u8,
    /// Raw score the call was derived from.
    pub score: i32,
    /// Explanations of every rule applied, in evaluation order.
    pub reasons: Vec<String>,
}

/// Stateless recommendation engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    /// Create an engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Score `results` into a recommendation.
    #[must_use]
    pub fn recommend(&self, results: &ExperimentResults) -> Recommendation {
        recommend(results)
    }
}

/// Score `results` into a recommendation.
#[must_use]
pub fn recommend(results: &ExperimentResults) -> Recommendation {
    let mut score = NEUTRAL_SCORE;
    let mut reasons = Vec::new();

    let primary = &results.primary_metric;
    if primary.is_significant && primary.lift > 0.0 {
        score += SIGNIFICANT_WIN_BONUS;
        reasons.push("primary metric shows statistically significant positive lift".to_string());
    } else if !primary.is_significant {
        score -= NOT_SIGNIFICANT_PENALTY;
        reasons.push("primary metric did not reach statistical significance".to_string());
    }

    let failed = results.count_with_status(GuardrailStatus::Failed);
    if failed > 0 {
        score -= FAILED_GUARDRAIL_PENALTY;
        reasons.push(format!("{} failed", guardrail_count(failed)));
    }
    let warnings = results.count_with_status(GuardrailStatus::Warning);
    if warnings > 0 {
        score -= WARNING_GUARDRAIL_PENALTY;
        reasons.push(format!("{} in warning state", guardrail_count(warnings)));
    }

    match results.sample_size.ratio() {
        Some(ratio) if ratio < MIN_SAMPLE_RATIO => {
            score -= UNDERPOWERED_PENALTY;
            reasons.push("sample size below 80% of target".to_string());
        }
        Some(_) => {}
        None => {
            reasons.push("sample size target unavailable; adequacy not assessed".to_string());
        }
    }

    let (kind, confidence) = classify(score);
    Recommendation {
        kind,
        confidence,
        score,
        reasons,
    }
}

fn classify(score: i32) -> (RecommendationType, u8) {
    if score >= SHIP_AT {
        (RecommendationType::Ship, to_confidence(score.min(MAX_SHIP_CONFIDENCE)))
    } else if score >= ITERATE_AT {
        (RecommendationType::Iterate, ITERATE_CONFIDENCE)
    } else if score >= EXTEND_AT {
        (RecommendationType::Extend, EXTEND_CONFIDENCE)
    } else {
        (RecommendationType::Stop, to_confidence((score - NEUTRAL_SCORE).abs()))
    }
}

fn to_confidence(value: i32) -> u8 {
    u8::try_from(value.clamp(0, 100)).unwrap_or(100)
}

fn guardrail_count(n: usize) -> String {
    if n == 1 {
        "1 guardrail metric".to_string()
    } else {
        format!("{n} guardrail metrics")
    }
}
