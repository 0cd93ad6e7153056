// ⚠️ Error Taxonomy - Typed errors for every ledger operation
//
// Business-rule violations are detected BEFORE a transaction begins and
// surface as their own variants. A failure inside a transaction means the
// invariant-preserving write itself could not complete; it rolls back and
// surfaces as `Internal`, which callers must treat differently from a
// business error.

use thiserror::Error;

use crate::money::Money;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or missing input (empty names, unknown kinds, bad config).
    #[error("validation error: {0}")]
    Validation(String),

    /// Amount is zero, negative, or otherwise unusable for the operation.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The seller's withdrawable balance cannot cover the requested amount.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Money, available: Money },

    /// The operation is not legal from the entity's current state
    /// (e.g., submitting an already-verified payout method).
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// The seller already has another payout method with this identifier.
    #[error("duplicate account: {0}")]
    DuplicateAccount(String),

    /// Another seller already holds a verified method with this identifier.
    #[error("account {identifier} already in use by seller {held_by}")]
    AccountAlreadyInUse { identifier: String, held_by: String },

    /// The account holder name does not plausibly match the seller.
    #[error("account name '{account_name}' does not match seller '{seller_name}'")]
    NameMismatch {
        account_name: String,
        seller_name: String,
    },

    /// The slot has no payment details to verify or pay against.
    #[error("missing payment details for {0}")]
    MissingPaymentDetails(String),

    /// Required identifying fields are absent from the payout method.
    #[error("incomplete details: {0}")]
    IncompleteDetails(String),

    /// The seller has no verified payout method; withdrawals are blocked.
    #[error("no verified payout method for seller {0}")]
    PayoutNotVerified(String),

    /// Seller, payout method, or withdrawal request does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The withdrawal request was already paid or rejected. Finalization
    /// never silently repeats financial side effects.
    #[error("withdrawal already finalized with status '{status}'")]
    AlreadyFinalized { status: String },

    /// The actor's role does not permit this operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Storage-level failure inside a transaction; everything rolled back.
    #[error("internal consistency error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Internal(format!("serialization: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// True for errors caused by the request itself rather than by storage.
    pub fn is_business_error(&self) -> bool {
        !matches!(self, LedgerError::Internal(_))
    }
}
