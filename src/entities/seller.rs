// 🏪 Seller Entity - Aggregate root for the balance ledger
//
// "Seller name is a VALUE (can change), Seller UUID is IDENTITY (never changes)"
//
// The seller row owns the three stored balance buckets. The fourth bucket
// (withdrawable) is derived on every read; see money::withdrawable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{BalanceBreakdown, Money};

// ============================================================================
// ACTOR / ROLE
// ============================================================================

/// Who is performing an operation. Admin-only operations check the role
/// before touching any state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Seller,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Seller => "seller",
            Role::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn admin(id: &str) -> Self {
        Actor {
            id: id.to_string(),
            role: Role::Admin,
        }
    }

    pub fn seller(id: &str) -> Self {
        Actor {
            id: id.to_string(),
            role: Role::Seller,
        }
    }

    pub fn system() -> Self {
        Actor {
            id: "system".to_string(),
            role: Role::System,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ============================================================================
// TAX CATEGORY
// ============================================================================

/// Seller tax category, consumed by the withholding tax calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxCategory {
    /// Standard registered business (withholding applies).
    Standard,
    /// Exempt sellers (NGOs, below-threshold individuals).
    Exempt,
}

impl TaxCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxCategory::Standard => "standard",
            TaxCategory::Exempt => "exempt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(TaxCategory::Standard),
            "exempt" => Some(TaxCategory::Exempt),
            _ => None,
        }
    }
}

// ============================================================================
// SELLER ENTITY
// ============================================================================

/// Seller aggregate: identity, names, tax category, and balance buckets.
///
/// `withdrawable_balance` is populated from the formula whenever a Seller is
/// loaded; it has no column of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seller {
    /// Stable identity (UUID) - NEVER changes
    pub id: String,

    pub name: String,
    pub shop_name: String,
    pub email: String,
    pub tax_category: TaxCategory,

    /// Total lifetime credited revenue. Only decremented when a withdrawal
    /// is actually paid out.
    pub balance: Money,

    /// Frozen by admin action (dispute/investigation).
    pub locked_balance: Money,

    /// Reserved by withdrawal requests awaiting an admin decision.
    pub pending_balance: Money,

    /// Set together whenever locked_balance is increased; cleared together
    /// on full unlock.
    pub locked_reason: Option<String>,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,

    /// Seller-level flag: "verified" once any payout method is verified.
    /// Gates withdrawal eligibility elsewhere in the platform.
    pub payout_status: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Seller {
    pub fn new(name: &str, shop_name: &str, email: &str, tax_category: TaxCategory) -> Self {
        Seller {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            shop_name: shop_name.to_string(),
            email: email.to_string(),
            tax_category,
            balance: 0,
            locked_balance: 0,
            pending_balance: 0,
            locked_reason: None,
            locked_by: None,
            locked_at: None,
            payout_status: None,
            created_at: Utc::now(),
        }
    }

    /// Current bucket snapshot with the derived withdrawable amount.
    pub fn breakdown(&self) -> BalanceBreakdown {
        BalanceBreakdown::new(self.balance, self.locked_balance, self.pending_balance)
    }

    pub fn withdrawable_balance(&self) -> Money {
        self.breakdown().withdrawable_balance
    }

    pub fn is_payout_verified(&self) -> bool {
        self.payout_status.as_deref() == Some("verified")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_seller_starts_empty() {
        let seller = Seller::new("Ama Mensah", "Ama's Fabrics", "ama@example.com", TaxCategory::Standard);
        assert_eq!(seller.balance, 0);
        assert_eq!(seller.withdrawable_balance(), 0);
        assert!(seller.breakdown().is_consistent());
        assert!(!seller.is_payout_verified());
    }

    #[test]
    fn test_breakdown_derives_withdrawable() {
        let mut seller = Seller::new("Kofi Boateng", "Kofi Electronics", "kofi@example.com", TaxCategory::Standard);
        seller.balance = 100_000;
        seller.locked_balance = 30_000;
        seller.pending_balance = 40_000;
        let b = seller.breakdown();
        assert_eq!(b.withdrawable_balance, 30_000);
        assert!(b.is_consistent());
    }

    #[test]
    fn test_actor_roles() {
        assert!(Actor::admin("adm-1").is_admin());
        assert!(!Actor::seller("sel-1").is_admin());
        assert_eq!(Actor::system().role.as_str(), "system");
    }
}
