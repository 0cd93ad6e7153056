// Payout Ledger - Core Library
// Seller balance ledger and payout verification engine for the marketplace.
// Exposes all modules for use in the CLI, API server, and tests.

pub mod audit;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod fraud;
pub mod ledger;
pub mod money;
pub mod outbox;
pub mod registry;
pub mod tax;
pub mod verification;
pub mod withdrawals;

// Re-export commonly used types
pub use audit::{append_audit, entries_for_seller, AuditLogEntry, AuditSink, SqliteAuditSink};
pub use config::{EligibilityRule, LedgerConfig, MethodCreationPolicy};
pub use db::{
    get_payout_method, get_payout_methods, get_seller, get_seller_by_email,
    get_verification_history, get_withdrawal, get_withdrawals_for_seller, insert_seller,
    open, open_memory, setup_database,
};
pub use entities::{
    Actor, PayoutDetails, PayoutKind, PayoutMethod, PayoutSlot, PayoutStatus, Role, Seller,
    TaxCategory, WithdrawalRequest, WithdrawalStatus,
};
pub use error::{LedgerError, Result};
pub use fraud::{check_reuse, name_match, normalize_identifier, IdentityResolver, NoopIdentityResolver};
pub use ledger::{BalanceLedger, Bucket};
pub use money::{format_money, withdrawable, BalanceBreakdown, Money};
pub use outbox::{NoopNotificationSink, Notification, NotificationSink, Outbox};
pub use registry::PayoutMethodRegistry;
pub use tax::{FlatRateTaxCalculator, TaxAssessment, TaxCalculator};
pub use verification::{VerificationOutcome, VerificationWorkflow};
pub use withdrawals::{FinalizeDecision, WithdrawalProcessor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
