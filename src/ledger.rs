// ⚖️ Balance Ledger - Four-bucket money model with invariant enforcement
//
// Stored buckets: balance, locked_balance, pending_balance. The fourth
// (withdrawable) is derived on every read. Every mutation goes through ONE
// conditional UPDATE whose WHERE clause encodes the invariants:
//
//   - no bucket goes negative
//   - pending never exceeds balance
//   - locked + pending never exceed balance
//
// The check and the mutation are a single atomic statement at the storage
// layer, so two concurrent writers cannot both pass a stale balance check
// and double-spend a bucket. Audit entries are written inside the same
// transaction as the bucket change.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::{append_audit, AuditLogEntry};
use crate::db::{get_seller, ts_to_sql};
use crate::entities::seller::Actor;
use crate::error::{LedgerError, Result};
use crate::money::{BalanceBreakdown, Money};

/// The two admin-adjustable buckets plus the lifetime balance itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    Balance,
    Locked,
    Pending,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Balance => "balance",
            Bucket::Locked => "locked_balance",
            Bucket::Pending => "pending_balance",
        }
    }
}

pub struct BalanceLedger;

impl BalanceLedger {
    // ========================================================================
    // READ SIDE
    // ========================================================================

    /// Current bucket values with the derived withdrawable amount.
    pub fn balance_breakdown(conn: &Connection, seller_id: &str) -> Result<BalanceBreakdown> {
        let seller = get_seller(conn, seller_id)?;
        Ok(seller.breakdown())
    }

    // ========================================================================
    // GENERIC DELTA
    // ========================================================================

    /// Apply a signed delta to one bucket. The invariants are enforced by
    /// the storage layer; a violating delta returns a typed error and
    /// changes nothing. Returns the new breakdown.
    pub fn apply_delta(
        conn: &mut Connection,
        seller_id: &str,
        bucket: Bucket,
        delta: Money,
        reason: &str,
        actor: &Actor,
    ) -> Result<BalanceBreakdown> {
        let tx = conn.transaction()?;

        let (d_balance, d_locked, d_pending) = match bucket {
            Bucket::Balance => (delta, 0, 0),
            Bucket::Locked => (0, delta, 0),
            Bucket::Pending => (0, 0, delta),
        };
        let after = match shift_buckets(&tx, seller_id, d_balance, d_locked, d_pending)? {
            Some(after) => after,
            None => {
                // Guard failed or the seller does not exist; NotFound wins.
                let seller = get_seller(&tx, seller_id)?;
                return Err(if delta > 0 && bucket != Bucket::Balance {
                    LedgerError::InsufficientFunds {
                        requested: delta,
                        available: seller.withdrawable_balance(),
                    }
                } else {
                    LedgerError::InvalidAmount(format!(
                        "delta {} on {} violates balance invariants",
                        delta,
                        bucket.as_str()
                    ))
                });
            }
        };

        let entry = AuditLogEntry::new(
            actor,
            "balance_delta",
            seller_id,
            "seller",
            seller_id,
            serde_json::json!({
                "bucket": bucket.as_str(),
                "delta": delta,
                "reason": reason,
                "after": after,
            }),
        );
        append_audit(&tx, &entry)?;
        tx.commit()?;
        Ok(after)
    }

    /// Credit revenue from a settled order into the lifetime balance.
    pub fn credit_sale(
        conn: &mut Connection,
        seller_id: &str,
        amount: Money,
        reason: &str,
    ) -> Result<BalanceBreakdown> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "sale credit must be positive, got {}",
                amount
            )));
        }
        let tx = conn.transaction()?;
        let after = shift_buckets(&tx, seller_id, amount, 0, 0)?
            .ok_or_else(|| LedgerError::NotFound(format!("seller {}", seller_id)))?;

        let entry = AuditLogEntry::new(
            &Actor::system(),
            "sale_credited",
            seller_id,
            "seller",
            seller_id,
            serde_json::json!({ "amount": amount, "reason": reason, "after": after }),
        );
        append_audit(&tx, &entry)?;
        tx.commit()?;
        Ok(after)
    }

    // ========================================================================
    // ADMIN LOCK / UNLOCK
    // ========================================================================

    /// Freeze part of the withdrawable balance (dispute, investigation).
    /// Fails with InsufficientFunds if the amount exceeds what is currently
    /// withdrawable. Records reason/actor/timestamp on the seller row.
    pub fn lock_funds(
        conn: &mut Connection,
        seller_id: &str,
        amount: Money,
        reason: &str,
        actor: &Actor,
    ) -> Result<BalanceBreakdown> {
        require_admin(actor, "lock funds")?;
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "lock amount must be positive, got {}",
                amount
            )));
        }

        let tx = conn.transaction()?;
        let before = get_seller(&tx, seller_id)?;
        let after = shift_buckets(&tx, seller_id, 0, amount, 0)?.ok_or_else(|| {
            LedgerError::InsufficientFunds {
                requested: amount,
                available: before.withdrawable_balance(),
            }
        })?;

        tx.execute(
            "UPDATE sellers SET locked_reason = ?2, locked_by = ?3, locked_at = ?4 WHERE id = ?1",
            params![seller_id, reason, actor.id, ts_to_sql(&chrono::Utc::now())],
        )?;

        let entry = AuditLogEntry::new(
            actor,
            "funds_locked",
            seller_id,
            "seller",
            seller_id,
            serde_json::json!({ "amount": amount, "reason": reason, "after": after }),
        )
        .with_status_change(None, Some("locked"));
        append_audit(&tx, &entry)?;
        tx.commit()?;

        info!(seller_id, amount, reason, "funds locked");
        Ok(after)
    }

    /// Release locked funds. With no amount, releases everything. A full
    /// unlock clears the lock metadata.
    pub fn unlock_funds(
        conn: &mut Connection,
        seller_id: &str,
        amount: Option<Money>,
        actor: &Actor,
    ) -> Result<BalanceBreakdown> {
        require_admin(actor, "unlock funds")?;

        let tx = conn.transaction()?;
        let before = get_seller(&tx, seller_id)?;
        let amount = amount.unwrap_or(before.locked_balance);
        if amount < 0 || amount > before.locked_balance {
            return Err(LedgerError::InvalidAmount(format!(
                "unlock amount {} exceeds locked balance {}",
                amount, before.locked_balance
            )));
        }

        let after = shift_buckets(&tx, seller_id, 0, -amount, 0)?.ok_or_else(|| {
            LedgerError::Internal("unlock guard failed after range check".to_string())
        })?;

        if after.locked_balance == 0 {
            tx.execute(
                "UPDATE sellers SET locked_reason = NULL, locked_by = NULL, locked_at = NULL
                 WHERE id = ?1",
                params![seller_id],
            )?;
        }

        let entry = AuditLogEntry::new(
            actor,
            "funds_unlocked",
            seller_id,
            "seller",
            seller_id,
            serde_json::json!({
                "amount": amount,
                "fully_unlocked": after.locked_balance == 0,
                "after": after,
            }),
        )
        .with_status_change(Some("locked"), None);
        append_audit(&tx, &entry)?;
        tx.commit()?;

        info!(seller_id, amount, "funds unlocked");
        Ok(after)
    }

    /// Admin override: set the lifetime balance outright, zeroing locked and
    /// pending. Always audited; the action is never silently undocumented.
    pub fn reset_balance(
        conn: &mut Connection,
        seller_id: &str,
        new_balance: Money,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<BalanceBreakdown> {
        require_admin(actor, "reset balance")?;
        if new_balance < 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "balance cannot be reset to {}",
                new_balance
            )));
        }

        let tx = conn.transaction()?;
        let before = get_seller(&tx, seller_id)?;

        tx.execute(
            "UPDATE sellers SET balance = ?2, locked_balance = 0, pending_balance = 0,
                 locked_reason = NULL, locked_by = NULL, locked_at = NULL
             WHERE id = ?1",
            params![seller_id, new_balance],
        )?;
        let after = BalanceBreakdown::new(new_balance, 0, 0);

        let entry = AuditLogEntry::new(
            actor,
            "balance_reset",
            seller_id,
            "seller",
            seller_id,
            serde_json::json!({
                "reason": reason,
                "before": before.breakdown(),
                "after": after,
            }),
        );
        append_audit(&tx, &entry)?;
        tx.commit()?;

        info!(seller_id, new_balance, "balance reset by admin");
        Ok(after)
    }
}

fn require_admin(actor: &Actor, what: &str) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized(format!(
            "{} requires an admin actor, got role '{}'",
            what,
            actor.role.as_str()
        )))
    }
}

/// The single conditional bucket update. All invariants live in the WHERE
/// clause; returns None when a guard rejected the shift (or the seller does
/// not exist - callers disambiguate).
pub(crate) fn shift_buckets(
    conn: &Connection,
    seller_id: &str,
    d_balance: Money,
    d_locked: Money,
    d_pending: Money,
) -> Result<Option<BalanceBreakdown>> {
    let changed = conn.execute(
        "UPDATE sellers SET
            balance = balance + ?2,
            locked_balance = locked_balance + ?3,
            pending_balance = pending_balance + ?4
         WHERE id = ?1
           AND balance + ?2 >= 0
           AND locked_balance + ?3 >= 0
           AND pending_balance + ?4 >= 0
           AND pending_balance + ?4 <= balance + ?2
           AND (balance + ?2) - (locked_balance + ?3) - (pending_balance + ?4) >= 0",
        params![seller_id, d_balance, d_locked, d_pending],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    let after = conn.query_row(
        "SELECT balance, locked_balance, pending_balance FROM sellers WHERE id = ?1",
        params![seller_id],
        |row| {
            Ok(BalanceBreakdown::new(
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
            ))
        },
    )?;
    debug_assert!(after.is_consistent());
    Ok(Some(after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::count_entries;
    use crate::db::{insert_seller, open_memory};
    use crate::entities::seller::{Seller, TaxCategory};

    fn seller_with_balance(conn: &mut Connection, balance: Money) -> Seller {
        let seller = Seller::new("Ama Mensah", "Ama's Fabrics", "ama@example.com", TaxCategory::Standard);
        insert_seller(conn, &seller).unwrap();
        if balance > 0 {
            BalanceLedger::credit_sale(conn, &seller.id, balance, "order settled").unwrap();
        }
        seller
    }

    #[test]
    fn test_credit_sale_increases_balance() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_balance(&mut conn, 100_000);
        let b = BalanceLedger::balance_breakdown(&conn, &seller.id).unwrap();
        assert_eq!(b.balance, 100_000);
        assert_eq!(b.withdrawable_balance, 100_000);
        assert!(b.is_consistent());
        assert_eq!(count_entries(&conn, &seller.id, "sale_credited").unwrap(), 1);
    }

    #[test]
    fn test_lock_then_unlock_roundtrip() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_balance(&mut conn, 100_000);
        let admin = Actor::admin("admin-1");

        let b = BalanceLedger::lock_funds(&mut conn, &seller.id, 30_000, "dispute", &admin).unwrap();
        assert_eq!(b.locked_balance, 30_000);
        assert_eq!(b.withdrawable_balance, 70_000);
        assert!(b.is_consistent());

        let loaded = get_seller(&conn, &seller.id).unwrap();
        assert_eq!(loaded.locked_reason.as_deref(), Some("dispute"));
        assert_eq!(loaded.locked_by.as_deref(), Some("admin-1"));
        assert!(loaded.locked_at.is_some());

        // Partial unlock keeps the metadata.
        let b = BalanceLedger::unlock_funds(&mut conn, &seller.id, Some(10_000), &admin).unwrap();
        assert_eq!(b.locked_balance, 20_000);
        let loaded = get_seller(&conn, &seller.id).unwrap();
        assert!(loaded.locked_reason.is_some());

        // Full unlock (default amount) clears it.
        let b = BalanceLedger::unlock_funds(&mut conn, &seller.id, None, &admin).unwrap();
        assert_eq!(b.locked_balance, 0);
        assert_eq!(b.withdrawable_balance, 100_000);
        let loaded = get_seller(&conn, &seller.id).unwrap();
        assert!(loaded.locked_reason.is_none());
        assert!(loaded.locked_by.is_none());
        assert!(loaded.locked_at.is_none());
    }

    #[test]
    fn test_lock_more_than_withdrawable_fails() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_balance(&mut conn, 50_000);
        let admin = Actor::admin("admin-1");

        let err = BalanceLedger::lock_funds(&mut conn, &seller.id, 60_000, "dispute", &admin).unwrap_err();
        match err {
            LedgerError::InsufficientFunds { requested, available } => {
                assert_eq!(requested, 60_000);
                assert_eq!(available, 50_000);
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
        // Nothing changed.
        let b = BalanceLedger::balance_breakdown(&conn, &seller.id).unwrap();
        assert_eq!(b.locked_balance, 0);
    }

    #[test]
    fn test_unlock_more_than_locked_fails() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_balance(&mut conn, 50_000);
        let admin = Actor::admin("admin-1");
        BalanceLedger::lock_funds(&mut conn, &seller.id, 20_000, "dispute", &admin).unwrap();

        let err = BalanceLedger::unlock_funds(&mut conn, &seller.id, Some(30_000), &admin).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }

    #[test]
    fn test_non_admin_cannot_lock() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_balance(&mut conn, 50_000);
        let err = BalanceLedger::lock_funds(&mut conn, &seller.id, 10_000, "x", &Actor::seller("s")).unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
    }

    #[test]
    fn test_reset_zeroes_other_buckets_and_audits() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_balance(&mut conn, 100_000);
        let admin = Actor::admin("admin-1");
        BalanceLedger::lock_funds(&mut conn, &seller.id, 30_000, "dispute", &admin).unwrap();

        let b = BalanceLedger::reset_balance(&mut conn, &seller.id, 25_000, &admin, None).unwrap();
        assert_eq!(b.balance, 25_000);
        assert_eq!(b.locked_balance, 0);
        assert_eq!(b.pending_balance, 0);
        assert_eq!(b.withdrawable_balance, 25_000);
        assert!(b.is_consistent());

        // Reset is audited even without a reason.
        assert_eq!(count_entries(&conn, &seller.id, "balance_reset").unwrap(), 1);
        let loaded = get_seller(&conn, &seller.id).unwrap();
        assert!(loaded.locked_reason.is_none());
    }

    #[test]
    fn test_apply_delta_rejects_negative_buckets() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_balance(&mut conn, 10_000);
        let admin = Actor::admin("admin-1");

        assert!(BalanceLedger::apply_delta(&mut conn, &seller.id, Bucket::Balance, -20_000, "adj", &admin).is_err());
        assert!(BalanceLedger::apply_delta(&mut conn, &seller.id, Bucket::Locked, -1, "adj", &admin).is_err());
        // Pending above balance is rejected too.
        assert!(BalanceLedger::apply_delta(&mut conn, &seller.id, Bucket::Pending, 20_000, "adj", &admin).is_err());
    }

    #[test]
    fn test_invariant_holds_across_operation_sequence() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_balance(&mut conn, 100_000);
        let admin = Actor::admin("admin-1");

        let results = [
            BalanceLedger::lock_funds(&mut conn, &seller.id, 25_000, "dispute", &admin).unwrap(),
            BalanceLedger::apply_delta(&mut conn, &seller.id, Bucket::Pending, 40_000, "reserve", &admin).unwrap(),
            BalanceLedger::unlock_funds(&mut conn, &seller.id, Some(5_000), &admin).unwrap(),
            BalanceLedger::credit_sale(&mut conn, &seller.id, 12_345, "order").unwrap(),
            BalanceLedger::apply_delta(&mut conn, &seller.id, Bucket::Pending, -40_000, "release", &admin).unwrap(),
            BalanceLedger::unlock_funds(&mut conn, &seller.id, None, &admin).unwrap(),
            BalanceLedger::reset_balance(&mut conn, &seller.id, 55_000, &admin, Some("correction")).unwrap(),
        ];

        for after in results {
            assert!(after.is_consistent(), "invariant broken: {:?}", after);
        }
    }
}
