//! Variant Allocation - configured traffic share vs. observed assignments

use serde::{Deserialize, Serialize};

/// Traffic allocation of one variant.
///
/// Across all variants of an experiment the `expected_share`s sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantAllocation {
    variant_id: String,
    expected_share: f64,
    observed_count: u64,
}

impl VariantAllocation {
    /// Create a variant allocation.
    #[must_use]
    pub fn new(variant_id: impl Into<String>, expected_share: f64, observed_count: u64) -> Self {
        Self {
            variant_id: variant_id.into(),
            expected_share,
            observed_count,
        }
    }

    /// Get the variant ID.
    #[must_use]
    pub fn variant_id(&self) -> &str {
        &self.variant_id
    }

    /// Get the configured share of traffic, in (0, 1].
    #[must_use]
    pub const fn expected_share(&self) -> f64 {
        self.expected_share
    }

    /// Get the number of units actually assigned to this variant.
    #[must_use]
    pub const fn observed_count(&self) -> u64 {
        self.observed_count
    }
}
