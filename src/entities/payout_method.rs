// 🏦 PayoutMethod Entity - Verification state machine per destination
//
// A seller holds at most one active method per slot (bank / mobile money);
// creating a new one for an occupied slot replaces the old record, it does
// not append. The two slots verify INDEPENDENTLY: a verified bank account
// and a rejected mobile wallet can coexist on the same seller.
//
// State machine:
//
//   draft → pending → verified
//                  ↘ rejected → pending   (resubmission)
//
// Editing identifying fields while verified/rejected forces the method back
// to pending and clears all verification metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

// ============================================================================
// KIND / SLOT
// ============================================================================

/// Concrete payout destination kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutKind {
    Bank,
    MtnMomo,
    VodafoneCash,
    AirtelTigoMoney,
}

impl PayoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutKind::Bank => "bank",
            PayoutKind::MtnMomo => "mtn_momo",
            PayoutKind::VodafoneCash => "vodafone_cash",
            PayoutKind::AirtelTigoMoney => "airtel_tigo_money",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bank" => Some(PayoutKind::Bank),
            "mtn_momo" => Some(PayoutKind::MtnMomo),
            "vodafone_cash" => Some(PayoutKind::VodafoneCash),
            "airtel_tigo_money" => Some(PayoutKind::AirtelTigoMoney),
            _ => None,
        }
    }

    /// Which of the two per-seller slots this kind occupies.
    pub fn slot(&self) -> PayoutSlot {
        match self {
            PayoutKind::Bank => PayoutSlot::Bank,
            _ => PayoutSlot::Mobile,
        }
    }
}

/// The two per-seller destination slots. Each verifies independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutSlot {
    Bank,
    Mobile,
}

impl PayoutSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutSlot::Bank => "bank",
            PayoutSlot::Mobile => "mobile",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bank" => Some(PayoutSlot::Bank),
            "mobile" => Some(PayoutSlot::Mobile),
            _ => None,
        }
    }
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Created but not yet submitted for review.
    Draft,
    /// Awaiting admin verification.
    Pending,
    /// Approved; usable as a withdrawal destination.
    Verified,
    /// Rejected with a stored reason; may be resubmitted.
    Rejected,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Draft => "draft",
            PayoutStatus::Pending => "pending",
            PayoutStatus::Verified => "verified",
            PayoutStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PayoutStatus::Draft),
            "pending" => Some(PayoutStatus::Pending),
            "verified" => Some(PayoutStatus::Verified),
            "rejected" => Some(PayoutStatus::Rejected),
            _ => None,
        }
    }
}

// ============================================================================
// PAYOUT DETAILS
// ============================================================================

/// Identifying fields of a destination, as submitted by the seller.
///
/// Bank methods carry `account_number` + `bank_name`; mobile-money methods
/// carry `phone_number`. `account_name` is the human name on the
/// destination and is checked against the seller's registered name during
/// verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDetails {
    pub kind: PayoutKind,
    pub account_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl PayoutDetails {
    pub fn bank(account_name: &str, account_number: &str, bank_name: &str) -> Self {
        PayoutDetails {
            kind: PayoutKind::Bank,
            account_name: account_name.to_string(),
            account_number: Some(account_number.to_string()),
            bank_name: Some(bank_name.to_string()),
            phone_number: None,
        }
    }

    pub fn mobile(kind: PayoutKind, account_name: &str, phone_number: &str) -> Self {
        PayoutDetails {
            kind,
            account_name: account_name.to_string(),
            account_number: None,
            bank_name: None,
            phone_number: Some(phone_number.to_string()),
        }
    }

    /// Validate that all identifying fields required by the kind are present
    /// and non-empty.
    pub fn check_complete(&self) -> Result<()> {
        if self.account_name.trim().is_empty() {
            return Err(LedgerError::IncompleteDetails(
                "account name is required".to_string(),
            ));
        }
        match self.kind.slot() {
            PayoutSlot::Bank => {
                let number_ok = self
                    .account_number
                    .as_deref()
                    .is_some_and(|s| !s.trim().is_empty());
                let bank_ok = self
                    .bank_name
                    .as_deref()
                    .is_some_and(|s| !s.trim().is_empty());
                if !number_ok || !bank_ok {
                    return Err(LedgerError::IncompleteDetails(
                        "bank methods require account number and bank name".to_string(),
                    ));
                }
            }
            PayoutSlot::Mobile => {
                let phone_ok = self
                    .phone_number
                    .as_deref()
                    .is_some_and(|s| !s.trim().is_empty());
                if !phone_ok {
                    return Err(LedgerError::IncompleteDetails(
                        "mobile money methods require a phone number".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// True when the fields that identify the destination differ. A changed
    /// account holder name alone does not reset verification.
    pub fn identifying_fields_differ(&self, other: &PayoutDetails) -> bool {
        self.kind != other.kind
            || self.account_number != other.account_number
            || self.bank_name != other.bank_name
            || self.phone_number != other.phone_number
    }
}

// ============================================================================
// PAYOUT METHOD ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutMethod {
    /// Stable identity (UUID) - NEVER changes
    pub id: String,

    pub seller_id: String,
    pub details: PayoutDetails,

    /// Normalized destination identifier used for cross-seller reuse
    /// detection. See fraud::normalize_identifier.
    pub normalized_id: String,

    pub status: PayoutStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub rejection_reason: Option<String>,

    /// The destination used when a withdrawal names no explicit slot.
    pub is_default: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutMethod {
    pub fn new(seller_id: &str, details: PayoutDetails, normalized_id: String, status: PayoutStatus) -> Self {
        let now = Utc::now();
        PayoutMethod {
            id: uuid::Uuid::new_v4().to_string(),
            seller_id: seller_id.to_string(),
            details,
            normalized_id,
            status,
            verified_at: None,
            verified_by: None,
            rejection_reason: None,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn slot(&self) -> PayoutSlot {
        self.details.kind.slot()
    }

    pub fn is_verified(&self) -> bool {
        self.status == PayoutStatus::Verified
    }

    /// Validate the submit-for-verification transition. Only legal from
    /// `draft` or `rejected`.
    pub fn check_submittable(&self) -> Result<()> {
        match self.status {
            PayoutStatus::Draft | PayoutStatus::Rejected => Ok(()),
            other => Err(LedgerError::InvalidStateTransition(format!(
                "cannot submit a '{}' payout method for verification",
                other.as_str()
            ))),
        }
    }

    /// Apply an edit to the details. Changing identifying fields while
    /// verified or rejected resets the method to pending and clears all
    /// verification metadata (invariant: stale approvals never survive an
    /// identity change).
    pub fn apply_edit(&mut self, new_details: PayoutDetails, new_normalized_id: String) {
        let identity_changed = self.details.identifying_fields_differ(&new_details);
        self.details = new_details;
        self.normalized_id = new_normalized_id;
        self.updated_at = Utc::now();

        if identity_changed
            && matches!(self.status, PayoutStatus::Verified | PayoutStatus::Rejected)
        {
            self.status = PayoutStatus::Pending;
            self.verified_at = None;
            self.verified_by = None;
            self.rejection_reason = None;
        }
    }
}
