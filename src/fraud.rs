// 🕵️ Fraud Guard - Destination reuse detection and name plausibility
//
// Two independent defenses run before any payout method is approved:
//
// 1. Reuse check: the normalized destination identifier must not already be
//    bound to a VERIFIED method of a different seller.
// 2. Name match: the account holder's name must plausibly match the
//    seller's registered name or shop name (word overlap or substring on
//    normalized lowercase tokens of 3+ characters).
//
// Both run OUTSIDE the approval transaction; they are pure reads.

use rusqlite::{params, Connection};

use crate::entities::payout_method::{PayoutDetails, PayoutSlot};
use crate::error::{LedgerError, Result};

// ============================================================================
// IDENTIFIER NORMALIZATION
// ============================================================================

/// Canonical destination identifier, namespaced by destination type so a
/// phone number can never collide with a bank account number.
///
/// - bank:   `bank:<bank name, lowercase alnum>:<account digits>`
/// - mobile: `phone:<0XXXXXXXXX>` with `+233`/`233` prefixes folded to `0`
pub fn normalize_identifier(details: &PayoutDetails) -> Result<String> {
    match details.kind.slot() {
        PayoutSlot::Bank => {
            let number = details.account_number.as_deref().ok_or_else(|| {
                LedgerError::IncompleteDetails("bank method has no account number".to_string())
            })?;
            let bank = details.bank_name.as_deref().ok_or_else(|| {
                LedgerError::IncompleteDetails("bank method has no bank name".to_string())
            })?;
            Ok(format!(
                "bank:{}:{}",
                strip_non_alnum(&bank.to_lowercase()),
                strip_non_alnum(number)
            ))
        }
        PayoutSlot::Mobile => {
            let phone = details.phone_number.as_deref().ok_or_else(|| {
                LedgerError::IncompleteDetails("mobile method has no phone number".to_string())
            })?;
            Ok(format!("phone:{}", normalize_phone(phone)))
        }
    }
}

fn strip_non_alnum(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Fold Ghana international prefixes to local format: +233244123456 and
/// 233244123456 both become 0244123456.
fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if let Some(rest) = digits.strip_prefix("233") {
        if rest.len() == 9 {
            return format!("0{}", rest);
        }
    }
    digits
}

// ============================================================================
// NAME PLAUSIBILITY
// ============================================================================

/// Heuristic: does the account holder name plausibly belong to this seller?
///
/// Tokens shorter than 3 characters are ignored (initials, "de", "el").
/// Matches when any significant token is shared, or when one normalized
/// name contains the other.
pub fn name_match(account_name: &str, seller_name: &str, shop_name: &str) -> bool {
    let account = normalize_name(account_name);
    if account.is_empty() {
        return false;
    }
    [seller_name, shop_name].iter().any(|candidate| {
        let candidate = normalize_name(candidate);
        if candidate.is_empty() {
            return false;
        }
        if account.contains(&candidate) || candidate.contains(&account) {
            return true;
        }
        let account_tokens: Vec<&str> =
            account.split_whitespace().filter(|t| t.len() >= 3).collect();
        candidate
            .split_whitespace()
            .filter(|t| t.len() >= 3)
            .any(|t| account_tokens.contains(&t))
    })
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// REUSE CHECK
// ============================================================================

/// Scan other sellers' VERIFIED methods for the same normalized identifier.
/// Returns `AccountAlreadyInUse` naming the conflicting seller.
pub fn check_reuse(conn: &Connection, seller_id: &str, normalized_id: &str) -> Result<()> {
    let holder: Option<String> = conn
        .query_row(
            "SELECT s.name FROM payout_methods m
             JOIN sellers s ON s.id = m.seller_id
             WHERE m.normalized_id = ?1 AND m.status = 'verified' AND m.seller_id != ?2",
            params![normalized_id, seller_id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match holder {
        Some(name) => Err(LedgerError::AccountAlreadyInUse {
            identifier: normalized_id.to_string(),
            held_by: name,
        }),
        None => Ok(()),
    }
}

// ============================================================================
// IDENTITY RESOLVER
// ============================================================================

/// Locates a unified platform identity for a seller email, used to
/// cross-reference payout records. Absence is a normal outcome.
pub trait IdentityResolver {
    fn find_linked_account(&self, seller_email: &str) -> Option<String>;
}

/// Default resolver for deployments without a unified identity service.
pub struct NoopIdentityResolver;

impl IdentityResolver for NoopIdentityResolver {
    fn find_linked_account(&self, _seller_email: &str) -> Option<String> {
        None
    }
}
