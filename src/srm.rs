//! Sample Ratio Mismatch (SRM) check
//!
//! **Problem**: A broken randomizer (bot filtering on one arm, a redirect that
//! drops users, a sticky-bucketing bug) silently invalidates every metric.
//!
//! **Solution**: Pearson chi-squared goodness-of-fit of observed assignment
//! counts against the configured allocation, `df = variants - 1`.
//!
//! The significance bar defaults to `0.001`. SRM runs continuously, so a
//! looser bar would page someone every few days on healthy experiments.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::experiment::VariantAllocation;
use crate::stats::chi_squared_survival;
use crate::{Error, Result};

/// Default significance bar for flagging a mismatch.
pub const DEFAULT_SRM_ALPHA: f64 = 0.001;

/// Default tolerance on the sum of expected shares.
pub const DEFAULT_ALLOCATION_TOLERANCE: f64 = 1e-6;

/// Why an SRM verdict could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsufficientData {
    /// Fewer than two variants.
    TooFewVariants {
        /// Number of variants supplied.
        count: usize,
    },
    /// No unit has been assigned yet.
    NoObservations,
}

impl fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewVariants { count } => {
                write!(f, "insufficient data: need at least 2 variants, got {count}")
            }
            Self::NoObservations => write!(f, "insufficient data: no observations yet"),
        }
    }
}

/// Outcome of an SRM check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SrmReport {
    /// Whether the traffic split deviates beyond the significance bar.
    pub mismatched: bool,
    /// Chi-squared p-value (1.0 when data is insufficient).
    pub p_value: f64,
    /// Test statistic.
    pub chi_squared: f64,
    /// `variants - 1`.
    pub degrees_of_freedom: usize,
    /// Set when no verdict was possible.
    pub insufficient_data: Option<InsufficientData>,
}

impl SrmReport {
    const fn insufficient(reason: InsufficientData, degrees_of_freedom: usize) -> Self {
        Self {
            mismatched: false,
            p_value: 1.0,
            chi_squared: 0.0,
            degrees_of_freedom,
            insufficient_data: Some(reason),
        }
    }
}

/// Chi-squared SRM checker.
#[derive(Debug, Clone, Copy)]
pub struct SrmChecker {
    alpha: f64,
    allocation_tolerance: f64,
}

impl Default for SrmChecker {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_SRM_ALPHA,
            allocation_tolerance: DEFAULT_ALLOCATION_TOLERANCE,
        }
    }
}

impl SrmChecker {
    /// Create a checker with a custom significance bar.
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }

    /// Set the tolerance on the sum of expected shares.
    #[must_use]
    pub const fn with_allocation_tolerance(mut self, tolerance: f64) -> Self {
        self.allocation_tolerance = tolerance;
        self
    }

    /// Get the significance bar.
    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Reject allocations that could never describe a real split.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAllocation`] for a share outside (0, 1], a
    /// duplicate variant, or shares not summing to 1.
    pub fn validate_allocations(&self, allocations: &[VariantAllocation]) -> Result<()> {
        let mut seen = HashSet::with_capacity(allocations.len());
        for allocation in allocations {
            let share = allocation.expected_share();
            if !share.is_finite() || share <= 0.0 || share > 1.0 {
                return Err(Error::InvalidAllocation(format!(
                    "variant '{}' has expected share {share}, must be in (0, 1]",
                    allocation.variant_id()
                )));
            }
            if !seen.insert(allocation.variant_id()) {
                return Err(Error::InvalidAllocation(format!(
                    "variant '{}' listed more than once",
                    allocation.variant_id()
                )));
            }
        }
        let total: f64 = allocations.iter().map(VariantAllocation::expected_share).sum();
        if (total - 1.0).abs() > self.allocation_tolerance {
            return Err(Error::InvalidAllocation(format!(
                "expected shares sum to {total}, must sum to 1"
            )));
        }
        Ok(())
    }

    /// Run the chi-squared test over one experiment's variants.
    ///
    /// Fewer than two variants or zero observations give a non-mismatched
    /// report with `insufficient_data` set rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAllocation`] if the allocation is malformed or
    /// the observed counts do not fit in a `u64` total.
    #[allow(clippy::cast_precision_loss)]
    pub fn check_srm(&self, allocations: &[VariantAllocation]) -> Result<SrmReport> {
        let degrees_of_freedom = allocations.len().saturating_sub(1);
        if allocations.len() < 2 {
            return Ok(SrmReport::insufficient(
                InsufficientData::TooFewVariants {
                    count: allocations.len(),
                },
                degrees_of_freedom,
            ));
        }
        self.validate_allocations(allocations)?;

        let total = allocations
            .iter()
            .try_fold(0u64, |acc, a| acc.checked_add(a.observed_count()))
            .ok_or_else(|| Error::InvalidAllocation("observed counts overflow u64".to_string()))?;
        if total == 0 {
            return Ok(SrmReport::insufficient(
                InsufficientData::NoObservations,
                degrees_of_freedom,
            ));
        }

        let total = total as f64;
        let chi_squared: f64 = allocations
            .iter()
            .map(|allocation| {
                let expected = allocation.expected_share() * total;
                let diff = allocation.observed_count() as f64 - expected;
                diff * diff / expected
            })
            .sum();
        let p_value = chi_squared_survival(chi_squared, degrees_of_freedom);
        let mismatched = p_value < self.alpha;

        if mismatched {
            warn!(
                chi_squared,
                p_value,
                alpha = self.alpha,
                "sample ratio mismatch detected"
            );
        }

        Ok(SrmReport {
            mismatched,
            p_value,
            chi_squared,
            degrees_of_freedom,
            insufficient_data: None,
        })
    }
}

/// Run [`SrmChecker::check_srm`] with the default significance bar.
///
/// # Errors
///
/// Returns [`Error::InvalidAllocation`] if the allocation is malformed.
pub fn check_srm(allocations: &[VariantAllocation]) -> Result<SrmReport> {
    SrmChecker::default().check_srm(allocations)
}
