// 🏦 Payout Method Registry - Destination lifecycle per seller slot
//
// Owns creation, edits, submission, and deletion of a seller's payout
// destinations, one per slot (bank / mobile money). Verification decisions
// live in verification.rs; this module only moves methods between the
// seller-controlled states.

use rusqlite::Connection;
use tracing::info;

use crate::audit::{append_audit, AuditLogEntry};
use crate::config::LedgerConfig;
use crate::db::{
    append_verification_event, delete_payout_method_row, get_payout_method, get_payout_methods,
    get_seller, insert_payout_method, update_payout_method,
};
use crate::entities::payout_method::{PayoutDetails, PayoutMethod, PayoutSlot, PayoutStatus};
use crate::entities::seller::Actor;
use crate::error::{LedgerError, Result};
use crate::fraud::normalize_identifier;

pub struct PayoutMethodRegistry {
    config: LedgerConfig,
}

impl PayoutMethodRegistry {
    pub fn new(config: LedgerConfig) -> Self {
        PayoutMethodRegistry { config }
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    /// Register a destination for the slot implied by `details.kind`. An
    /// existing method in that slot is REPLACED, not appended. The initial
    /// status follows the platform's creation policy (pending review by
    /// default, draft when explicit submission is required).
    pub fn create(
        &self,
        conn: &mut Connection,
        seller_id: &str,
        details: PayoutDetails,
        actor: &Actor,
    ) -> Result<PayoutMethod> {
        details.check_complete()?;
        let normalized_id = normalize_identifier(&details)?;
        let slot = details.kind.slot();

        let tx = conn.transaction()?;
        get_seller(&tx, seller_id)?;

        // The seller's OTHER methods must not already use this destination.
        for existing in get_payout_methods(&tx, seller_id)? {
            if existing.slot() != slot && existing.normalized_id == normalized_id {
                return Err(LedgerError::DuplicateAccount(format!(
                    "destination {} is already registered on this seller's {} slot",
                    normalized_id,
                    existing.slot().as_str()
                )));
            }
        }

        let initial_status = self.config.method_creation.initial_status();
        let method = PayoutMethod::new(seller_id, details, normalized_id, initial_status);

        // Replace-not-append: drop the previous occupant of the slot.
        let replaced = get_payout_method(&tx, seller_id, slot)?;
        if let Some(old) = &replaced {
            if old.status == PayoutStatus::Pending {
                return Err(LedgerError::InvalidStateTransition(format!(
                    "slot {} has a method pending verification; cancel it first",
                    slot.as_str()
                )));
            }
            // A replacement is a new, unverified destination; the default
            // flag never carries over.
            delete_payout_method_row(&tx, &old.id)?;
        }
        insert_payout_method(&tx, &method)?;

        let entry = AuditLogEntry::new(
            actor,
            "payout_method_created",
            seller_id,
            "payout_method",
            &method.id,
            serde_json::json!({
                "slot": slot.as_str(),
                "kind": method.details.kind.as_str(),
                "replaced": replaced.as_ref().map(|m| m.id.clone()),
            }),
        )
        .with_status_change(None, Some(initial_status.as_str()));
        append_audit(&tx, &entry)?;
        if initial_status == PayoutStatus::Pending {
            append_verification_event(&tx, seller_id, slot, "submitted", &actor.id, None)?;
        }
        tx.commit()?;

        info!(seller_id, slot = slot.as_str(), "payout method created");
        Ok(method)
    }

    // ========================================================================
    // SUBMIT FOR VERIFICATION
    // ========================================================================

    /// Move a draft or rejected method into the admin review queue.
    pub fn submit_for_verification(
        &self,
        conn: &mut Connection,
        seller_id: &str,
        slot: PayoutSlot,
        actor: &Actor,
    ) -> Result<PayoutMethod> {
        let tx = conn.transaction()?;
        let mut method = get_payout_method(&tx, seller_id, slot)?.ok_or_else(|| {
            LedgerError::NotFound(format!("no {} payout method for seller {}", slot.as_str(), seller_id))
        })?;

        method.check_submittable()?;
        method.details.check_complete()?;

        let before = method.status;
        method.status = PayoutStatus::Pending;
        method.rejection_reason = None;
        method.updated_at = chrono::Utc::now();
        update_payout_method(&tx, &method)?;

        let entry = AuditLogEntry::new(
            actor,
            "payout_method_submitted",
            seller_id,
            "payout_method",
            &method.id,
            serde_json::json!({ "slot": slot.as_str() }),
        )
        .with_status_change(Some(before.as_str()), Some("pending"));
        append_audit(&tx, &entry)?;
        append_verification_event(&tx, seller_id, slot, "submitted", &actor.id, None)?;
        tx.commit()?;

        Ok(method)
    }

    // ========================================================================
    // EDIT
    // ========================================================================

    /// Update a method's details. Changing identifying fields while the
    /// method is verified or rejected resets it to pending and clears
    /// verification metadata (a stale approval never survives an identity
    /// change).
    pub fn update_details(
        &self,
        conn: &mut Connection,
        seller_id: &str,
        slot: PayoutSlot,
        new_details: PayoutDetails,
        actor: &Actor,
    ) -> Result<PayoutMethod> {
        if new_details.kind.slot() != slot {
            return Err(LedgerError::Validation(format!(
                "kind {} does not belong to slot {}",
                new_details.kind.as_str(),
                slot.as_str()
            )));
        }
        new_details.check_complete()?;
        let normalized_id = normalize_identifier(&new_details)?;

        let tx = conn.transaction()?;
        let mut method = get_payout_method(&tx, seller_id, slot)?.ok_or_else(|| {
            LedgerError::NotFound(format!("no {} payout method for seller {}", slot.as_str(), seller_id))
        })?;

        let before = method.status;
        method.apply_edit(new_details, normalized_id);
        update_payout_method(&tx, &method)?;

        let entry = AuditLogEntry::new(
            actor,
            "payout_method_updated",
            seller_id,
            "payout_method",
            &method.id,
            serde_json::json!({
                "slot": slot.as_str(),
                "verification_reset": before != method.status,
            }),
        )
        .with_status_change(Some(before.as_str()), Some(method.status.as_str()));
        append_audit(&tx, &entry)?;
        tx.commit()?;

        Ok(method)
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    /// Remove a payout method. Blocked while verification is pending. When
    /// the deleted method was the default, another verified method is
    /// promoted if one exists; otherwise the seller is left without a
    /// default.
    pub fn delete(
        &self,
        conn: &mut Connection,
        seller_id: &str,
        slot: PayoutSlot,
        actor: &Actor,
    ) -> Result<()> {
        let tx = conn.transaction()?;
        let method = get_payout_method(&tx, seller_id, slot)?.ok_or_else(|| {
            LedgerError::NotFound(format!("no {} payout method for seller {}", slot.as_str(), seller_id))
        })?;

        if method.status == PayoutStatus::Pending {
            return Err(LedgerError::InvalidStateTransition(
                "cannot delete a method pending verification; cancel it first".to_string(),
            ));
        }

        let mut promoted = None;
        if method.is_default {
            for mut other in get_payout_methods(&tx, seller_id)? {
                if other.id != method.id && other.is_verified() {
                    other.is_default = true;
                    other.updated_at = chrono::Utc::now();
                    update_payout_method(&tx, &other)?;
                    promoted = Some(other.id.clone());
                    break;
                }
            }
        }
        delete_payout_method_row(&tx, &method.id)?;

        let entry = AuditLogEntry::new(
            actor,
            "payout_method_deleted",
            seller_id,
            "payout_method",
            &method.id,
            serde_json::json!({
                "slot": slot.as_str(),
                "was_default": method.is_default,
                "promoted_default": promoted,
            }),
        )
        .with_status_change(Some(method.status.as_str()), None);
        append_audit(&tx, &entry)?;
        tx.commit()?;

        info!(seller_id, slot = slot.as_str(), "payout method deleted");
        Ok(())
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Resolve the destination a withdrawal should pay to. One precedence
    /// order, applied everywhere:
    ///
    ///   1. the explicitly requested slot (must be verified)
    ///   2. the seller's default method (must be verified)
    ///   3. a verified bank method
    ///   4. a verified mobile method
    pub fn resolve_payout_details(
        conn: &Connection,
        seller_id: &str,
        slot: Option<PayoutSlot>,
    ) -> Result<PayoutMethod> {
        if let Some(slot) = slot {
            let method = get_payout_method(conn, seller_id, slot)?.ok_or_else(|| {
                LedgerError::MissingPaymentDetails(format!(
                    "{} slot of seller {}",
                    slot.as_str(),
                    seller_id
                ))
            })?;
            if !method.is_verified() {
                return Err(LedgerError::PayoutNotVerified(seller_id.to_string()));
            }
            return Ok(method);
        }

        let methods = get_payout_methods(conn, seller_id)?;
        let verified: Vec<&PayoutMethod> = methods.iter().filter(|m| m.is_verified()).collect();
        if let Some(default) = verified.iter().find(|m| m.is_default) {
            return Ok((*default).clone());
        }
        if let Some(bank) = verified.iter().find(|m| m.slot() == PayoutSlot::Bank) {
            return Ok((*bank).clone());
        }
        if let Some(mobile) = verified.iter().find(|m| m.slot() == PayoutSlot::Mobile) {
            return Ok((*mobile).clone());
        }
        Err(LedgerError::PayoutNotVerified(seller_id.to_string()))
    }

    /// Withdrawal eligibility per the configured rule. Default is ANY:
    /// one verified slot is enough.
    pub fn is_eligible_for_withdrawal(&self, conn: &Connection, seller_id: &str) -> Result<bool> {
        let methods = get_payout_methods(conn, seller_id)?;
        if methods.is_empty() {
            return Ok(false);
        }
        Ok(match self.config.eligibility {
            crate::config::EligibilityRule::AnyVerified => methods.iter().any(|m| m.is_verified()),
            crate::config::EligibilityRule::AllVerified => methods.iter().all(|m| m.is_verified()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EligibilityRule, MethodCreationPolicy};
    use crate::db::{insert_seller, open_memory};
    use crate::entities::payout_method::PayoutKind;
    use crate::entities::seller::{Seller, TaxCategory};

    fn setup(conn: &mut Connection) -> Seller {
        let seller = Seller::new("Ama Mensah", "Ama's Fabrics", "ama@example.com", TaxCategory::Standard);
        insert_seller(conn, &seller).unwrap();
        seller
    }

    fn registry() -> PayoutMethodRegistry {
        PayoutMethodRegistry::new(LedgerConfig::default())
    }

    fn mark_verified(conn: &Connection, seller_id: &str, slot: PayoutSlot, default: bool) {
        let mut method = get_payout_method(conn, seller_id, slot).unwrap().unwrap();
        method.status = PayoutStatus::Verified;
        method.verified_at = Some(chrono::Utc::now());
        method.verified_by = Some("admin-1".to_string());
        method.is_default = default;
        update_payout_method(conn, &method).unwrap();
    }

    #[test]
    fn test_create_starts_pending_under_immediate_review() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let method = registry()
            .create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id))
            .unwrap();
        assert_eq!(method.status, PayoutStatus::Pending);
    }

    #[test]
    fn test_create_starts_draft_under_explicit_submission() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let config = LedgerConfig {
            method_creation: MethodCreationPolicy::ExplicitSubmission,
            ..LedgerConfig::default()
        };
        let reg = PayoutMethodRegistry::new(config);
        let method = reg
            .create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id))
            .unwrap();
        assert_eq!(method.status, PayoutStatus::Draft);

        // Draft requires an explicit submission step.
        let submitted = reg
            .submit_for_verification(&mut conn, &seller.id, PayoutSlot::Bank, &Actor::seller(&seller.id))
            .unwrap();
        assert_eq!(submitted.status, PayoutStatus::Pending);
    }

    #[test]
    fn test_submit_pending_method_is_rejected() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let reg = registry();
        reg.create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id)).unwrap();
        let err = reg
            .submit_for_verification(&mut conn, &seller.id, PayoutSlot::Bank, &Actor::seller(&seller.id))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition(_)));
    }

    #[test]
    fn test_duplicate_identifier_across_own_slots() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let reg = registry();

        // Seed the bank slot with a row whose normalized identifier matches
        // what the mobile submission below will normalize to.
        let planted = crate::entities::payout_method::PayoutMethod::new(
            &seller.id,
            PayoutDetails::bank("Ama Mensah", "0244123456", "GCB Bank"),
            "phone:0244123456".to_string(),
            PayoutStatus::Rejected,
        );
        crate::db::insert_payout_method(&conn, &planted).unwrap();

        let err = reg
            .create(&mut conn, &seller.id, PayoutDetails::mobile(PayoutKind::MtnMomo, "Ama Mensah", "0244123456"), &Actor::seller(&seller.id))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateAccount(_)));
    }

    #[test]
    fn test_create_replaces_existing_slot_occupant() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let reg = registry();
        reg.create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id)).unwrap();
        mark_verified(&conn, &seller.id, PayoutSlot::Bank, true);

        let replacement = reg
            .create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "5566778899", "Ecobank"), &Actor::seller(&seller.id))
            .unwrap();

        let methods = get_payout_methods(&conn, &seller.id).unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].id, replacement.id);
        // A replacement is a new, unverified destination.
        assert_eq!(methods[0].status, PayoutStatus::Pending);
        assert!(!methods[0].is_default);
    }

    #[test]
    fn test_create_blocked_while_slot_pending() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let reg = registry();
        reg.create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id)).unwrap();

        let err = reg
            .create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "5566778899", "Ecobank"), &Actor::seller(&seller.id))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition(_)));
    }

    #[test]
    fn test_delete_blocked_while_pending() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let reg = registry();
        reg.create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id)).unwrap();

        let err = reg
            .delete(&mut conn, &seller.id, PayoutSlot::Bank, &Actor::seller(&seller.id))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition(_)));
    }

    #[test]
    fn test_delete_default_promotes_other_verified() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let reg = registry();
        reg.create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id)).unwrap();
        mark_verified(&conn, &seller.id, PayoutSlot::Bank, true);
        reg.create(&mut conn, &seller.id, PayoutDetails::mobile(PayoutKind::MtnMomo, "Ama Mensah", "0244123456"), &Actor::seller(&seller.id)).unwrap();
        mark_verified(&conn, &seller.id, PayoutSlot::Mobile, false);

        reg.delete(&mut conn, &seller.id, PayoutSlot::Bank, &Actor::seller(&seller.id)).unwrap();

        let remaining = get_payout_methods(&conn, &seller.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].slot(), PayoutSlot::Mobile);
        assert!(remaining[0].is_default, "surviving verified method promoted to default");
    }

    #[test]
    fn test_delete_default_with_no_fallback_leaves_none() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let reg = registry();
        reg.create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id)).unwrap();
        mark_verified(&conn, &seller.id, PayoutSlot::Bank, true);

        reg.delete(&mut conn, &seller.id, PayoutSlot::Bank, &Actor::seller(&seller.id)).unwrap();
        assert!(get_payout_methods(&conn, &seller.id).unwrap().is_empty());
        assert!(matches!(
            PayoutMethodRegistry::resolve_payout_details(&conn, &seller.id, None),
            Err(LedgerError::PayoutNotVerified(_))
        ));
    }

    #[test]
    fn test_resolution_precedence() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let reg = registry();
        reg.create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id)).unwrap();
        mark_verified(&conn, &seller.id, PayoutSlot::Bank, false);
        reg.create(&mut conn, &seller.id, PayoutDetails::mobile(PayoutKind::MtnMomo, "Ama Mensah", "0244123456"), &Actor::seller(&seller.id)).unwrap();
        mark_verified(&conn, &seller.id, PayoutSlot::Mobile, true);

        // Default (mobile) wins when no slot is named.
        let resolved = PayoutMethodRegistry::resolve_payout_details(&conn, &seller.id, None).unwrap();
        assert_eq!(resolved.slot(), PayoutSlot::Mobile);

        // An explicit slot overrides the default.
        let resolved = PayoutMethodRegistry::resolve_payout_details(&conn, &seller.id, Some(PayoutSlot::Bank)).unwrap();
        assert_eq!(resolved.slot(), PayoutSlot::Bank);
    }

    #[test]
    fn test_eligibility_any_vs_all() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let reg = registry();
        reg.create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id)).unwrap();
        mark_verified(&conn, &seller.id, PayoutSlot::Bank, true);
        reg.create(&mut conn, &seller.id, PayoutDetails::mobile(PayoutKind::MtnMomo, "Ama Mensah", "0244123456"), &Actor::seller(&seller.id)).unwrap();
        // Mobile stays pending.

        assert!(reg.is_eligible_for_withdrawal(&conn, &seller.id).unwrap());

        let strict = PayoutMethodRegistry::new(LedgerConfig {
            eligibility: EligibilityRule::AllVerified,
            ..LedgerConfig::default()
        });
        assert!(!strict.is_eligible_for_withdrawal(&conn, &seller.id).unwrap());
    }

    #[test]
    fn test_update_details_resets_verified_method() {
        let mut conn = open_memory().unwrap();
        let seller = setup(&mut conn);
        let reg = registry();
        reg.create(&mut conn, &seller.id, PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"), &Actor::seller(&seller.id)).unwrap();
        mark_verified(&conn, &seller.id, PayoutSlot::Bank, true);

        let updated = reg
            .update_details(&mut conn, &seller.id, PayoutSlot::Bank, PayoutDetails::bank("Ama Mensah", "9988776655", "GCB Bank"), &Actor::seller(&seller.id))
            .unwrap();
        assert_eq!(updated.status, PayoutStatus::Pending);
        assert!(updated.verified_at.is_none());
        assert!(updated.verified_by.is_none());
    }
}
