//! Error types for Trueno-Guard
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Guard error types
#[derive(Error, Debug)]
pub enum Error {
    /// Guardrail rule rejected at creation time
    #[error("Invalid guardrail rule '{rule_id}': {reason}\nFix the rule definition before it is saved")]
    InvalidRule {
        /// Offending rule ID
        rule_id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Persisted rule definition could not be read (broken safety net)
    #[error("Corrupt guardrail rule definition: {0}\nThe guardrail is NOT being enforced. Restore the rule from a known-good copy")]
    CorruptRule(String),

    /// Variant allocation configuration rejected by the SRM checker
    #[error("Invalid variant allocation: {0}")]
    InvalidAllocation(String),

    /// Scheduled experiment rejected
    #[error("Invalid schedule for experiment '{experiment_id}': {reason}")]
    InvalidSchedule {
        /// Offending experiment ID
        experiment_id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Evaluation requested for a rule that the store does not know
    #[error("Unknown guardrail rule: {0}")]
    UnknownRule(String),

    /// Metric feed read failed
    #[error("Metric feed error: {0}\nEvaluation is skipped for this cycle (fail safe)")]
    Feed(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
