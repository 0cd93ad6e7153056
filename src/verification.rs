// ✅ Verification Workflow - Admin approve/reject with fraud gates
//
// Approval runs the fraud gates (name plausibility, destination reuse)
// BEFORE opening the transaction, so nothing external happens inside the
// critical section. The transaction then flips the slot, updates the
// seller-level flag, appends history and audit, and enqueues the seller
// notification - all or nothing.
//
// Retried admin decisions are idempotent: re-approving a verified slot (or
// re-rejecting with the same reason) returns the current state as success
// and produces NO new side effects.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::{append_audit, AuditLogEntry};
use crate::db::{append_verification_event, get_payout_method, get_seller, update_payout_method};
use crate::entities::payout_method::{PayoutMethod, PayoutSlot, PayoutStatus};
use crate::entities::seller::Actor;
use crate::error::{LedgerError, Result};
use crate::fraud::{check_reuse, name_match};
use crate::outbox::{Notification, Outbox};

/// Outcome of an approve/reject call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub method: PayoutMethod,
    /// False when the call was an idempotent retry that changed nothing.
    pub applied: bool,
}

pub struct VerificationWorkflow;

impl VerificationWorkflow {
    // ========================================================================
    // APPROVE
    // ========================================================================

    pub fn approve(
        conn: &mut Connection,
        seller_id: &str,
        slot: PayoutSlot,
        actor: &Actor,
    ) -> Result<VerificationOutcome> {
        require_admin(actor, "approve payout method")?;

        let seller = get_seller(conn, seller_id)?;
        let method = get_payout_method(conn, seller_id, slot)?.ok_or_else(|| {
            LedgerError::MissingPaymentDetails(format!(
                "{} slot of seller {}",
                slot.as_str(),
                seller_id
            ))
        })?;

        // Idempotency: an already-verified slot is a success, not a re-run.
        if method.status == PayoutStatus::Verified {
            return Ok(VerificationOutcome { method, applied: false });
        }

        method.details.check_complete().map_err(|_| {
            LedgerError::MissingPaymentDetails(format!(
                "{} slot of seller {}",
                slot.as_str(),
                seller_id
            ))
        })?;

        // Fraud gates, outside the transaction. Hard stops.
        if !name_match(&method.details.account_name, &seller.name, &seller.shop_name) {
            return Err(LedgerError::NameMismatch {
                account_name: method.details.account_name.clone(),
                seller_name: seller.name.clone(),
            });
        }
        check_reuse(conn, seller_id, &method.normalized_id)?;

        let tx = conn.transaction()?;
        let mut method = method;
        let before = method.status;
        method.status = PayoutStatus::Verified;
        method.verified_at = Some(chrono::Utc::now());
        method.verified_by = Some(actor.id.clone());
        method.rejection_reason = None;
        // The first verified destination of any kind becomes the default.
        if !seller.is_payout_verified() {
            method.is_default = true;
        }
        method.updated_at = chrono::Utc::now();
        update_payout_method(&tx, &method)?;

        if !seller.is_payout_verified() {
            tx.execute(
                "UPDATE sellers SET payout_status = 'verified' WHERE id = ?1",
                rusqlite::params![seller_id],
            )?;
        }

        append_verification_event(&tx, seller_id, slot, "approved", &actor.id, None)?;
        let entry = AuditLogEntry::new(
            actor,
            "payout_method_approved",
            seller_id,
            "payout_method",
            &method.id,
            serde_json::json!({
                "slot": slot.as_str(),
                "normalized_id": method.normalized_id,
            }),
        )
        .with_status_change(Some(before.as_str()), Some("verified"));
        append_audit(&tx, &entry)?;

        Outbox::enqueue(
            &tx,
            &Notification::new(
                seller_id,
                "seller",
                "payout_method_verified",
                serde_json::json!({ "slot": slot.as_str() }),
            ),
        )?;
        tx.commit()?;

        info!(seller_id, slot = slot.as_str(), admin = %actor.id, "payout method approved");
        Ok(VerificationOutcome { method, applied: true })
    }

    // ========================================================================
    // REJECT
    // ========================================================================

    pub fn reject(
        conn: &mut Connection,
        seller_id: &str,
        slot: PayoutSlot,
        reason: &str,
        actor: &Actor,
    ) -> Result<VerificationOutcome> {
        require_admin(actor, "reject payout method")?;
        if reason.trim().is_empty() {
            return Err(LedgerError::Validation(
                "a rejection reason is required".to_string(),
            ));
        }

        get_seller(conn, seller_id)?;
        let method = get_payout_method(conn, seller_id, slot)?.ok_or_else(|| {
            LedgerError::MissingPaymentDetails(format!(
                "{} slot of seller {}",
                slot.as_str(),
                seller_id
            ))
        })?;

        // Idempotency: same decision, same reason - nothing to re-apply.
        if method.status == PayoutStatus::Rejected
            && method.rejection_reason.as_deref() == Some(reason)
        {
            return Ok(VerificationOutcome { method, applied: false });
        }

        let tx = conn.transaction()?;
        let mut method = method;
        let before = method.status;
        method.status = PayoutStatus::Rejected;
        method.rejection_reason = Some(reason.to_string());
        method.verified_at = None;
        method.verified_by = None;
        method.is_default = false;
        method.updated_at = chrono::Utc::now();
        update_payout_method(&tx, &method)?;

        append_verification_event(&tx, seller_id, slot, "rejected", &actor.id, Some(reason))?;
        let entry = AuditLogEntry::new(
            actor,
            "payout_method_rejected",
            seller_id,
            "payout_method",
            &method.id,
            serde_json::json!({ "slot": slot.as_str(), "reason": reason }),
        )
        .with_status_change(Some(before.as_str()), Some("rejected"));
        append_audit(&tx, &entry)?;

        Outbox::enqueue(
            &tx,
            &Notification::new(
                seller_id,
                "seller",
                "payout_method_rejected",
                serde_json::json!({ "slot": slot.as_str(), "reason": reason }),
            ),
        )?;
        tx.commit()?;

        info!(seller_id, slot = slot.as_str(), reason, "payout method rejected");
        Ok(VerificationOutcome { method, applied: true })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::count_entries;
    use crate::config::LedgerConfig;
    use crate::db::{get_verification_history, insert_seller, open_memory};
    use crate::entities::payout_method::{PayoutDetails, PayoutKind};
    use crate::entities::seller::{Seller, TaxCategory};
    use crate::outbox::Outbox;
    use crate::registry::PayoutMethodRegistry;

    fn seller_with_bank_method(conn: &mut Connection, name: &str, email: &str, account: &str) -> Seller {
        let seller = Seller::new(name, &format!("{} Shop", name), email, TaxCategory::Standard);
        insert_seller(conn, &seller).unwrap();
        PayoutMethodRegistry::new(LedgerConfig::default())
            .create(conn, &seller.id, PayoutDetails::bank(name, account, "GCB Bank"), &Actor::seller(&seller.id))
            .unwrap();
        seller
    }

    #[test]
    fn test_approve_happy_path() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_bank_method(&mut conn, "Ama Mensah", "ama@example.com", "0011223344");
        let admin = Actor::admin("admin-1");

        let outcome = VerificationWorkflow::approve(&mut conn, &seller.id, PayoutSlot::Bank, &admin).unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.method.status, PayoutStatus::Verified);
        assert_eq!(outcome.method.verified_by.as_deref(), Some("admin-1"));
        assert!(outcome.method.is_default, "first verified method becomes default");

        let loaded = get_seller(&conn, &seller.id).unwrap();
        assert!(loaded.is_payout_verified());

        // History: created-as-pending submission + approval.
        let history = get_verification_history(&conn, &seller.id).unwrap();
        assert_eq!(history.last().unwrap().1, "approved");

        // Seller notification queued transactionally.
        assert_eq!(Outbox::pending_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_approve_is_idempotent() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_bank_method(&mut conn, "Ama Mensah", "ama@example.com", "0011223344");
        let admin = Actor::admin("admin-1");

        let first = VerificationWorkflow::approve(&mut conn, &seller.id, PayoutSlot::Bank, &admin).unwrap();
        let second = VerificationWorkflow::approve(&mut conn, &seller.id, PayoutSlot::Bank, &admin).unwrap();

        assert!(first.applied);
        assert!(!second.applied);
        assert_eq!(first.method.verified_at, second.method.verified_at);

        // Exactly one audit entry and one notification from the two calls.
        assert_eq!(count_entries(&conn, &seller.id, "payout_method_approved").unwrap(), 1);
        assert_eq!(Outbox::pending_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_approve_blocks_name_mismatch() {
        let mut conn = open_memory().unwrap();
        let seller = Seller::new("Ama Mensah", "Ama's Fabrics", "ama@example.com", TaxCategory::Standard);
        insert_seller(&conn, &seller).unwrap();
        PayoutMethodRegistry::new(LedgerConfig::default())
            .create(&mut conn, &seller.id, PayoutDetails::bank("Yaw Owusu", "0011223344", "GCB Bank"), &Actor::seller(&seller.id))
            .unwrap();

        let err = VerificationWorkflow::approve(&mut conn, &seller.id, PayoutSlot::Bank, &Actor::admin("admin-1")).unwrap_err();
        assert!(matches!(err, LedgerError::NameMismatch { .. }));

        // Nothing committed: still pending, no audit, no notification.
        let method = get_payout_method(&conn, &seller.id, PayoutSlot::Bank).unwrap().unwrap();
        assert_eq!(method.status, PayoutStatus::Pending);
        assert_eq!(count_entries(&conn, &seller.id, "payout_method_approved").unwrap(), 0);
    }

    #[test]
    fn test_approve_blocks_reused_destination() {
        let mut conn = open_memory().unwrap();
        let ama = seller_with_bank_method(&mut conn, "Ama Mensah", "ama@example.com", "0011223344");
        VerificationWorkflow::approve(&mut conn, &ama.id, PayoutSlot::Bank, &Actor::admin("admin-1")).unwrap();

        // Kofi registers the SAME bank account.
        let kofi = Seller::new("Kofi Boateng", "Kofi Electronics", "kofi@example.com", TaxCategory::Standard);
        insert_seller(&conn, &kofi).unwrap();
        PayoutMethodRegistry::new(LedgerConfig::default())
            .create(&mut conn, &kofi.id, PayoutDetails::bank("Kofi Boateng", "0011223344", "GCB Bank"), &Actor::seller(&kofi.id))
            .unwrap();

        let err = VerificationWorkflow::approve(&mut conn, &kofi.id, PayoutSlot::Bank, &Actor::admin("admin-1")).unwrap_err();
        match err {
            LedgerError::AccountAlreadyInUse { held_by, .. } => assert_eq!(held_by, "Ama Mensah"),
            other => panic!("expected AccountAlreadyInUse, got {:?}", other),
        }
    }

    #[test]
    fn test_reject_stores_reason_and_is_idempotent() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_bank_method(&mut conn, "Ama Mensah", "ama@example.com", "0011223344");
        let admin = Actor::admin("admin-1");

        let first = VerificationWorkflow::reject(&mut conn, &seller.id, PayoutSlot::Bank, "illegible document", &admin).unwrap();
        assert!(first.applied);
        assert_eq!(first.method.status, PayoutStatus::Rejected);
        assert_eq!(first.method.rejection_reason.as_deref(), Some("illegible document"));
        assert!(first.method.verified_at.is_none());

        // Same reason: idempotent no-op.
        let second = VerificationWorkflow::reject(&mut conn, &seller.id, PayoutSlot::Bank, "illegible document", &admin).unwrap();
        assert!(!second.applied);
        assert_eq!(count_entries(&conn, &seller.id, "payout_method_rejected").unwrap(), 1);

        // A DIFFERENT reason is a new decision.
        let third = VerificationWorkflow::reject(&mut conn, &seller.id, PayoutSlot::Bank, "account closed", &admin).unwrap();
        assert!(third.applied);
        assert_eq!(count_entries(&conn, &seller.id, "payout_method_rejected").unwrap(), 2);
    }

    #[test]
    fn test_slots_verify_independently() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_bank_method(&mut conn, "Ama Mensah", "ama@example.com", "0011223344");
        let admin = Actor::admin("admin-1");
        PayoutMethodRegistry::new(LedgerConfig::default())
            .create(&mut conn, &seller.id, PayoutDetails::mobile(PayoutKind::MtnMomo, "Ama Mensah", "0244123456"), &Actor::seller(&seller.id))
            .unwrap();

        VerificationWorkflow::approve(&mut conn, &seller.id, PayoutSlot::Bank, &admin).unwrap();
        VerificationWorkflow::reject(&mut conn, &seller.id, PayoutSlot::Mobile, "unregistered SIM", &admin).unwrap();

        let bank = get_payout_method(&conn, &seller.id, PayoutSlot::Bank).unwrap().unwrap();
        let mobile = get_payout_method(&conn, &seller.id, PayoutSlot::Mobile).unwrap().unwrap();
        assert_eq!(bank.status, PayoutStatus::Verified);
        assert_eq!(mobile.status, PayoutStatus::Rejected);
    }

    #[test]
    fn test_non_admin_cannot_decide() {
        let mut conn = open_memory().unwrap();
        let seller = seller_with_bank_method(&mut conn, "Ama Mensah", "ama@example.com", "0011223344");
        let err = VerificationWorkflow::approve(&mut conn, &seller.id, PayoutSlot::Bank, &Actor::seller(&seller.id)).unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
    }

    #[test]
    fn test_approve_missing_slot() {
        let mut conn = open_memory().unwrap();
        let seller = Seller::new("Ama Mensah", "Ama's Fabrics", "ama@example.com", TaxCategory::Standard);
        insert_seller(&conn, &seller).unwrap();
        let err = VerificationWorkflow::approve(&mut conn, &seller.id, PayoutSlot::Mobile, &Actor::admin("admin-1")).unwrap_err();
        assert!(matches!(err, LedgerError::MissingPaymentDetails(_)));
    }
}
