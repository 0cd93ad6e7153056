// ⚙️ Ledger Configuration - Policy knobs with documented defaults
//
// Two behaviors the platform deliberately keeps configurable:
//
// - Whether a newly created payout method starts in `draft` (seller must
//   explicitly submit it) or goes straight to `pending` review. Default:
//   immediate review.
// - Whether withdrawal eligibility requires ANY verified payout method or
//   ALL method slots verified. Default: ANY (a verified bank account alone
//   is enough). Kept as a knob because stakeholders have answered this both
//   ways.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::entities::payout_method::PayoutStatus;
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodCreationPolicy {
    /// New methods start `pending`, immediately visible to admin review.
    ImmediateReview,
    /// New methods start `draft` and require an explicit submission step.
    ExplicitSubmission,
}

impl MethodCreationPolicy {
    pub fn initial_status(&self) -> PayoutStatus {
        match self {
            MethodCreationPolicy::ImmediateReview => PayoutStatus::Pending,
            MethodCreationPolicy::ExplicitSubmission => PayoutStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityRule {
    /// At least one verified payout method (bank OR mobile).
    AnyVerified,
    /// Every method slot the seller holds must be verified.
    AllVerified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_method_creation")]
    pub method_creation: MethodCreationPolicy,

    #[serde(default = "default_eligibility")]
    pub eligibility: EligibilityRule,

    /// Withholding rate for standard-category sellers, in basis points.
    #[serde(default = "default_standard_rate_bp")]
    pub standard_rate_bp: u32,
}

fn default_method_creation() -> MethodCreationPolicy {
    MethodCreationPolicy::ImmediateReview
}

fn default_eligibility() -> EligibilityRule {
    EligibilityRule::AnyVerified
}

fn default_standard_rate_bp() -> u32 {
    500
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            method_creation: default_method_creation(),
            eligibility: default_eligibility(),
            standard_rate_bp: default_standard_rate_bp(),
        }
    }
}

impl LedgerConfig {
    /// Load from a JSON file; missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| LedgerError::Validation(format!("cannot read config {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| LedgerError::Validation(format!("invalid config {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.method_creation, MethodCreationPolicy::ImmediateReview);
        assert_eq!(config.eligibility, EligibilityRule::AnyVerified);
        assert_eq!(config.standard_rate_bp, 500);
    }

    #[test]
    fn test_initial_status_follows_policy() {
        assert_eq!(
            MethodCreationPolicy::ImmediateReview.initial_status(),
            PayoutStatus::Pending
        );
        assert_eq!(
            MethodCreationPolicy::ExplicitSubmission.initial_status(),
            PayoutStatus::Draft
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{ "method_creation": "explicit_submission" }"#).unwrap();
        assert_eq!(config.method_creation, MethodCreationPolicy::ExplicitSubmission);
        assert_eq!(config.eligibility, EligibilityRule::AnyVerified);
    }
}
