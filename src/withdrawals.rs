// 📤 Withdrawal Processor - Reserve, then pay or release
//
// Creating a request RESERVES funds: pending_balance grows, balance itself
// is untouched. The reservation is a single conditional UPDATE
// ("increment pending only if balance - locked - pending >= amount"), so
// two concurrent requests can never both pass the balance check on a stale
// read. Finalization either pays (balance and pending both shrink) or
// rejects (pending shrinks, funds return to withdrawable).
//
// Tax is computed by the external calculator BEFORE the transaction; the
// critical section contains no external calls.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::{append_audit, AuditLogEntry};
use crate::config::LedgerConfig;
use crate::db::{get_seller, get_withdrawal, insert_withdrawal, ts_to_sql};
use crate::entities::payout_method::PayoutSlot;
use crate::entities::seller::Actor;
use crate::entities::withdrawal::{WithdrawalRequest, WithdrawalStatus};
use crate::error::{LedgerError, Result};
use crate::ledger::shift_buckets;
use crate::money::{BalanceBreakdown, Money};
use crate::outbox::{Notification, Outbox};
use crate::registry::PayoutMethodRegistry;
use crate::tax::TaxCalculator;

/// Admin decision on a pending withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizeDecision {
    /// Pay out: balance decreases by the requested amount.
    Approve,
    /// Release the reservation: funds return to withdrawable.
    Reject,
}

pub struct WithdrawalProcessor<T: TaxCalculator> {
    config: LedgerConfig,
    tax: T,
}

impl<T: TaxCalculator> WithdrawalProcessor<T> {
    pub fn new(config: LedgerConfig, tax: T) -> Self {
        WithdrawalProcessor { config, tax }
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    /// Seller-initiated: reserve `amount` and create the request record.
    /// The destination is resolved once and snapshotted into the request.
    pub fn create(
        &self,
        conn: &mut Connection,
        seller_id: &str,
        amount: Money,
        slot: Option<PayoutSlot>,
    ) -> Result<WithdrawalRequest> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "withdrawal amount must be positive, got {}",
                amount
            )));
        }

        let seller = get_seller(conn, seller_id)?;
        let registry = PayoutMethodRegistry::new(self.config.clone());
        if !registry.is_eligible_for_withdrawal(conn, seller_id)? {
            return Err(LedgerError::PayoutNotVerified(seller_id.to_string()));
        }

        // Snapshot the destination NOW; later edits to the payout method
        // must not follow the request.
        let method = PayoutMethodRegistry::resolve_payout_details(conn, seller_id, slot)?;
        let details = method.details.clone();
        let fingerprint = WithdrawalRequest::fingerprint(&details);

        // External computation happens before the critical section.
        let assessment = self.tax.compute(amount, seller.tax_category)?;

        let tx = conn.transaction()?;
        // Atomic check-and-reserve: pending grows only if withdrawable
        // covers the amount.
        let after = shift_buckets(&tx, seller_id, 0, 0, amount)?.ok_or_else(|| {
            LedgerError::InsufficientFunds {
                requested: amount,
                available: seller.withdrawable_balance(),
            }
        })?;

        let request = WithdrawalRequest {
            id: uuid::Uuid::new_v4().to_string(),
            seller_id: seller_id.to_string(),
            amount_requested: amount,
            payment_details: details,
            details_fingerprint: fingerprint,
            status: WithdrawalStatus::Pending,
            withholding_tax: assessment.withholding_tax,
            withholding_tax_rate_bp: assessment.rate_bp,
            amount_paid_to_seller: assessment.amount_paid_to_seller,
            seller_balance_before: seller.balance,
            created_at: chrono::Utc::now(),
            finalized_at: None,
            finalized_by: None,
        };
        insert_withdrawal(&tx, &request)?;

        let entry = AuditLogEntry::new(
            &Actor::seller(seller_id),
            "withdrawal_requested",
            seller_id,
            "withdrawal_request",
            &request.id,
            serde_json::json!({
                "amount": amount,
                "withholding_tax": assessment.withholding_tax,
                "details_fingerprint": request.details_fingerprint,
                "after": after,
            }),
        )
        .with_status_change(None, Some("pending"));
        append_audit(&tx, &entry)?;

        Outbox::enqueue(
            &tx,
            &Notification::new(
                "admin",
                "admin",
                "withdrawal_requested",
                serde_json::json!({ "seller_id": seller_id, "amount": amount }),
            ),
        )?;
        tx.commit()?;

        info!(seller_id, amount, request_id = %request.id, "withdrawal requested");
        Ok(request)
    }

    // ========================================================================
    // FINALIZE
    // ========================================================================

    /// Admin-initiated: pay or reject a pending request. Fails closed with
    /// `AlreadyFinalized` when the request was already paid or rejected;
    /// financial side effects are never re-applied.
    pub fn finalize(
        &self,
        conn: &mut Connection,
        withdrawal_id: &str,
        decision: FinalizeDecision,
        actor: &Actor,
    ) -> Result<WithdrawalRequest> {
        if !actor.is_admin() {
            return Err(LedgerError::Unauthorized(format!(
                "finalizing a withdrawal requires an admin actor, got role '{}'",
                actor.role.as_str()
            )));
        }

        let tx = conn.transaction()?;
        let mut request = get_withdrawal(&tx, withdrawal_id)?;
        if !request.status.is_finalizable() {
            return Err(LedgerError::AlreadyFinalized {
                status: request.status.as_str().to_string(),
            });
        }

        let before = get_seller(&tx, &request.seller_id)?.breakdown();
        let amount = request.amount_requested;

        let (after, new_status, action) = match decision {
            FinalizeDecision::Approve => {
                // Pay out: the reservation is consumed and the lifetime
                // balance finally decreases.
                let after = shift_buckets(&tx, &request.seller_id, -amount, 0, -amount)?
                    .ok_or_else(|| reservation_gone(&request, &before))?;
                (after, WithdrawalStatus::Paid, "withdrawal_paid")
            }
            FinalizeDecision::Reject => {
                // Release: only the reservation is undone; balance was
                // never debited.
                let after = shift_buckets(&tx, &request.seller_id, 0, 0, -amount)?
                    .ok_or_else(|| reservation_gone(&request, &before))?;
                (after, WithdrawalStatus::Rejected, "withdrawal_rejected")
            }
        };

        let prev_status = request.status;
        request.status = new_status;
        request.finalized_at = Some(chrono::Utc::now());
        request.finalized_by = Some(actor.id.clone());
        tx.execute(
            "UPDATE withdrawal_requests SET status = ?2, finalized_at = ?3, finalized_by = ?4
             WHERE id = ?1",
            rusqlite::params![
                request.id,
                request.status.as_str(),
                request.finalized_at.as_ref().map(ts_to_sql),
                request.finalized_by,
            ],
        )?;

        let entry = AuditLogEntry::new(
            actor,
            action,
            &request.seller_id,
            "withdrawal_request",
            &request.id,
            serde_json::json!({
                "amount": amount,
                "amount_paid_to_seller": request.amount_paid_to_seller,
                "withholding_tax": request.withholding_tax,
                "before": before,
                "after": after,
            }),
        )
        .with_status_change(Some(prev_status.as_str()), Some(new_status.as_str()));
        append_audit(&tx, &entry)?;

        Outbox::enqueue(
            &tx,
            &Notification::new(
                &request.seller_id,
                "seller",
                action,
                serde_json::json!({
                    "request_id": request.id,
                    "amount": amount,
                    "amount_paid_to_seller": request.amount_paid_to_seller,
                }),
            ),
        )?;
        tx.commit()?;

        info!(
            request_id = %request.id,
            decision = ?decision,
            admin = %actor.id,
            "withdrawal finalized"
        );
        Ok(request)
    }
}

/// A reservation that no longer covers the request means an admin reset ran
/// between creation and finalization. Fail closed.
fn reservation_gone(request: &WithdrawalRequest, before: &BalanceBreakdown) -> LedgerError {
    LedgerError::InvalidStateTransition(format!(
        "reservation for withdrawal {} no longer backed by buckets (pending {}, requested {})",
        request.id, before.pending_balance, request.amount_requested
    ))
}
