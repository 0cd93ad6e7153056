// 💰 Money Model - Integer minor units and the four-bucket breakdown
//
// All amounts are i64 minor units (pesewas). Integer arithmetic keeps the
// bucket-sum invariant an exact equality:
//
//   balance == locked_balance + pending_balance + withdrawable_balance
//
// `withdrawable` is NEVER stored. It is recomputed from the other three
// buckets by `withdrawable()` on every read and every mutation, which
// eliminates an entire class of drift bugs.

use serde::{Deserialize, Serialize};

/// Monetary amount in minor units (pesewas). 100 = GHS 1.00.
pub type Money = i64;

/// Compute the withdrawable portion of a balance.
///
/// Always `max(0, balance - locked - pending)`. This is the single source
/// of truth; no caller computes it inline.
pub fn withdrawable(balance: Money, locked: Money, pending: Money) -> Money {
    (balance - locked - pending).max(0)
}

/// Format minor units as a currency string, e.g. 38_000 → "GHS 380.00".
pub fn format_money(amount: Money) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.abs();
    format!("{}GHS {}.{:02}", sign, abs / 100, abs % 100)
}

// ============================================================================
// BALANCE BREAKDOWN
// ============================================================================

/// Snapshot of a seller's balance buckets, returned by every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBreakdown {
    pub balance: Money,
    pub locked_balance: Money,
    pub pending_balance: Money,
    pub withdrawable_balance: Money,
}

impl BalanceBreakdown {
    pub fn new(balance: Money, locked: Money, pending: Money) -> Self {
        BalanceBreakdown {
            balance,
            locked_balance: locked,
            pending_balance: pending,
            withdrawable_balance: withdrawable(balance, locked, pending),
        }
    }

    /// Check the bucket-sum invariant. Holds for every committed state.
    pub fn is_consistent(&self) -> bool {
        self.balance >= 0
            && self.locked_balance >= 0
            && self.pending_balance >= 0
            && self.withdrawable_balance >= 0
            && self.pending_balance <= self.balance
            && self.balance
                == self.locked_balance + self.pending_balance + self.withdrawable_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdrawable_basic() {
        assert_eq!(withdrawable(100_000, 30_000, 40_000), 30_000);
        assert_eq!(withdrawable(100_000, 0, 0), 100_000);
    }

    #[test]
    fn test_withdrawable_clamps_at_zero() {
        // The formula clamps at zero rather than producing a negative bucket.
        assert_eq!(withdrawable(10_000, 8_000, 8_000), 0);
    }

    #[test]
    fn test_breakdown_consistency() {
        let b = BalanceBreakdown::new(100_000, 30_000, 40_000);
        assert!(b.is_consistent());
        assert_eq!(
            b.balance,
            b.locked_balance + b.pending_balance + b.withdrawable_balance
        );
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(38_000), "GHS 380.00");
        assert_eq!(format_money(5), "GHS 0.05");
        assert_eq!(format_money(-150), "-GHS 1.50");
    }
}
