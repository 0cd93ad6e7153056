// 📤 WithdrawalRequest Entity - Reservation record with a frozen destination
//
// The payment details are a SNAPSHOT taken at request time. Later edits to
// the seller's payout method must never retroactively change where an
// in-flight withdrawal pays out, so the request stores its own copy plus a
// SHA-256 fingerprint for tamper-evidence in the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entities::payout_method::PayoutDetails;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    /// Reservation made, awaiting admin decision.
    Pending,
    /// Approved by admin, payout in flight (still reserved).
    Approved,
    /// Paid out; terminal.
    Paid,
    /// Rejected; reservation released; terminal.
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Paid => "paid",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WithdrawalStatus::Pending),
            "approved" => Some(WithdrawalStatus::Approved),
            "paid" => Some(WithdrawalStatus::Paid),
            "rejected" => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }

    /// Finalization is only legal from pending/approved. Paid and rejected
    /// are terminal.
    pub fn is_finalizable(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending | WithdrawalStatus::Approved)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Stable identity (UUID) - NEVER changes
    pub id: String,

    pub seller_id: String,
    pub amount_requested: Money,

    /// Snapshot of the destination at request time, never a live reference.
    pub payment_details: PayoutDetails,
    /// SHA-256 over the serialized snapshot.
    pub details_fingerprint: String,

    pub status: WithdrawalStatus,

    pub withholding_tax: Money,
    /// Rate in basis points (500 = 5%).
    pub withholding_tax_rate_bp: u32,
    pub amount_paid_to_seller: Money,

    /// Seller's total balance at request time, for audit reconciliation.
    pub seller_balance_before: Money,

    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub finalized_by: Option<String>,
}

impl WithdrawalRequest {
    pub fn fingerprint(details: &PayoutDetails) -> String {
        let serialized = serde_json::to_string(details).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
