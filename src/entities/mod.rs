// Entity Models - Seller, PayoutMethod, WithdrawalRequest
//
// Each entity has:
// - Stable identity (UUID) that NEVER changes
// - Values that change only through the engine modules (ledger, registry,
//   verification, withdrawals), never by direct field writes from callers

pub mod payout_method;
pub mod seller;
pub mod withdrawal;

pub use payout_method::{PayoutDetails, PayoutKind, PayoutMethod, PayoutSlot, PayoutStatus};
pub use seller::{Actor, Role, Seller, TaxCategory};
pub use withdrawal::{WithdrawalRequest, WithdrawalStatus};
