// 🗄️ Database Layer - SQLite schema + row access for the ledger
//
// One SQLite database holds the whole aggregate: sellers (with the three
// stored balance buckets), payout methods, withdrawal requests, the
// append-only audit log, verification history, and the notification outbox.
//
// Crash safety: WAL journal mode, foreign keys ON, and every multi-row
// mutation in the engine modules runs inside an explicit transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;

use crate::entities::payout_method::{PayoutDetails, PayoutKind, PayoutMethod, PayoutSlot, PayoutStatus};
use crate::entities::seller::{Seller, TaxCategory};
use crate::entities::withdrawal::{WithdrawalRequest, WithdrawalStatus};
use crate::error::{LedgerError, Result};

/// Open or create the ledger database at the given path.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(LedgerError::from)?;
    configure(&conn)?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(LedgerError::from)?;
    configure(&conn)?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas. WAL for crash recovery, busy_timeout so
/// concurrent writers queue instead of erroring.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // ==========================================================================
    // Sellers Table - balance buckets are INTEGER minor units (pesewas).
    // withdrawable_balance has NO column: it is derived on every read.
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sellers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            shop_name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            tax_category TEXT NOT NULL,
            balance INTEGER NOT NULL DEFAULT 0,
            locked_balance INTEGER NOT NULL DEFAULT 0,
            pending_balance INTEGER NOT NULL DEFAULT 0,
            locked_reason TEXT,
            locked_by TEXT,
            locked_at TEXT,
            payout_status TEXT,
            created_at TEXT NOT NULL,
            CHECK (balance >= 0),
            CHECK (locked_balance >= 0),
            CHECK (pending_balance >= 0),
            CHECK (pending_balance <= balance)
        )",
        [],
    )?;

    // ==========================================================================
    // Payout Methods Table - one active method per (seller, slot)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS payout_methods (
            id TEXT PRIMARY KEY,
            seller_id TEXT NOT NULL REFERENCES sellers(id),
            slot TEXT NOT NULL,
            kind TEXT NOT NULL,
            account_name TEXT NOT NULL,
            account_number TEXT,
            bank_name TEXT,
            phone_number TEXT,
            normalized_id TEXT NOT NULL,
            status TEXT NOT NULL,
            verified_at TEXT,
            verified_by TEXT,
            rejection_reason TEXT,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (seller_id, slot)
        )",
        [],
    )?;

    // Cross-seller reuse backstop: at most one VERIFIED method may hold a
    // given normalized identifier, platform-wide. FraudGuard performs the
    // user-facing check; this index keeps the invariant under concurrent
    // approvals.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_verified_normalized_id
         ON payout_methods (normalized_id) WHERE status = 'verified'",
        [],
    )?;

    // ==========================================================================
    // Withdrawal Requests Table - payment_details is a JSON snapshot
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS withdrawal_requests (
            id TEXT PRIMARY KEY,
            seller_id TEXT NOT NULL REFERENCES sellers(id),
            amount_requested INTEGER NOT NULL,
            payment_details TEXT NOT NULL,
            details_fingerprint TEXT NOT NULL,
            status TEXT NOT NULL,
            withholding_tax INTEGER NOT NULL,
            withholding_tax_rate_bp INTEGER NOT NULL,
            amount_paid_to_seller INTEGER NOT NULL,
            seller_balance_before INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            finalized_at TEXT,
            finalized_by TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_withdrawals_seller
         ON withdrawal_requests (seller_id, created_at)",
        [],
    )?;

    // ==========================================================================
    // Audit Log Table - append-only; no UPDATE or DELETE path exists
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_log (
            id TEXT PRIMARY KEY,
            actor TEXT NOT NULL,
            actor_role TEXT NOT NULL,
            action TEXT NOT NULL,
            seller_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            before_status TEXT,
            after_status TEXT,
            metadata TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_seller
         ON audit_log (seller_id, created_at)",
        [],
    )?;

    // ==========================================================================
    // Verification History Table - ordered, append-only per seller
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS verification_events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            seller_id TEXT NOT NULL REFERENCES sellers(id),
            slot TEXT NOT NULL,
            action TEXT NOT NULL,
            actor TEXT NOT NULL,
            reason TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Notification Outbox Table - enqueued in the main transaction,
    // dispatched out-of-band (see outbox.rs)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS outbox (
            id TEXT PRIMARY KEY,
            recipient TEXT NOT NULL,
            recipient_role TEXT NOT NULL,
            event_kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            dispatched_at TEXT
        )",
        [],
    )?;

    Ok(())
}

// ============================================================================
// TIMESTAMP HELPERS
// ============================================================================

pub(crate) fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn ts_from_sql(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| rusqlite::Error::InvalidQuery)
}

fn opt_ts_from_sql(s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.as_deref().map(ts_from_sql).transpose()
}

// ============================================================================
// SELLER ACCESS
// ============================================================================

pub fn insert_seller(conn: &Connection, seller: &Seller) -> Result<()> {
    conn.execute(
        "INSERT INTO sellers (
            id, name, shop_name, email, tax_category,
            balance, locked_balance, pending_balance,
            locked_reason, locked_by, locked_at, payout_status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            seller.id,
            seller.name,
            seller.shop_name,
            seller.email,
            seller.tax_category.as_str(),
            seller.balance,
            seller.locked_balance,
            seller.pending_balance,
            seller.locked_reason,
            seller.locked_by,
            seller.locked_at.as_ref().map(ts_to_sql),
            seller.payout_status,
            ts_to_sql(&seller.created_at),
        ],
    )?;
    Ok(())
}

fn seller_from_row(row: &Row) -> rusqlite::Result<Seller> {
    let tax_str: String = row.get(4)?;
    let locked_at: Option<String> = row.get(10)?;
    let created_at: String = row.get(12)?;

    Ok(Seller {
        id: row.get(0)?,
        name: row.get(1)?,
        shop_name: row.get(2)?,
        email: row.get(3)?,
        tax_category: TaxCategory::parse(&tax_str).ok_or(rusqlite::Error::InvalidQuery)?,
        balance: row.get(5)?,
        locked_balance: row.get(6)?,
        pending_balance: row.get(7)?,
        locked_reason: row.get(8)?,
        locked_by: row.get(9)?,
        locked_at: opt_ts_from_sql(locked_at)?,
        payout_status: row.get(11)?,
        created_at: ts_from_sql(&created_at)?,
    })
}

const SELLER_COLUMNS: &str = "id, name, shop_name, email, tax_category,
    balance, locked_balance, pending_balance,
    locked_reason, locked_by, locked_at, payout_status, created_at";

pub fn get_seller(conn: &Connection, seller_id: &str) -> Result<Seller> {
    let sql = format!("SELECT {} FROM sellers WHERE id = ?1", SELLER_COLUMNS);
    conn.query_row(&sql, params![seller_id], seller_from_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                LedgerError::NotFound(format!("seller {}", seller_id))
            }
            other => other.into(),
        })
}

pub fn get_seller_by_email(conn: &Connection, email: &str) -> Result<Seller> {
    let sql = format!("SELECT {} FROM sellers WHERE email = ?1", SELLER_COLUMNS);
    conn.query_row(&sql, params![email], seller_from_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                LedgerError::NotFound(format!("seller with email {}", email))
            }
            other => other.into(),
        })
}

// ============================================================================
// PAYOUT METHOD ACCESS
// ============================================================================

const METHOD_COLUMNS: &str = "id, seller_id, kind, account_name, account_number,
    bank_name, phone_number, normalized_id, status,
    verified_at, verified_by, rejection_reason, is_default, created_at, updated_at";

fn method_from_row(row: &Row) -> rusqlite::Result<PayoutMethod> {
    let kind_str: String = row.get(2)?;
    let kind = PayoutKind::parse(&kind_str).ok_or(rusqlite::Error::InvalidQuery)?;
    let status_str: String = row.get(8)?;
    let verified_at: Option<String> = row.get(9)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(PayoutMethod {
        id: row.get(0)?,
        seller_id: row.get(1)?,
        details: PayoutDetails {
            kind,
            account_name: row.get(3)?,
            account_number: row.get(4)?,
            bank_name: row.get(5)?,
            phone_number: row.get(6)?,
        },
        normalized_id: row.get(7)?,
        status: PayoutStatus::parse(&status_str).ok_or(rusqlite::Error::InvalidQuery)?,
        verified_at: opt_ts_from_sql(verified_at)?,
        verified_by: row.get(10)?,
        rejection_reason: row.get(11)?,
        is_default: row.get::<_, i64>(12)? != 0,
        created_at: ts_from_sql(&created_at)?,
        updated_at: ts_from_sql(&updated_at)?,
    })
}

pub fn insert_payout_method(conn: &Connection, method: &PayoutMethod) -> Result<()> {
    conn.execute(
        "INSERT INTO payout_methods (
            id, seller_id, slot, kind, account_name, account_number, bank_name,
            phone_number, normalized_id, status, verified_at, verified_by,
            rejection_reason, is_default, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            method.id,
            method.seller_id,
            method.slot().as_str(),
            method.details.kind.as_str(),
            method.details.account_name,
            method.details.account_number,
            method.details.bank_name,
            method.details.phone_number,
            method.normalized_id,
            method.status.as_str(),
            method.verified_at.as_ref().map(ts_to_sql),
            method.verified_by,
            method.rejection_reason,
            method.is_default as i64,
            ts_to_sql(&method.created_at),
            ts_to_sql(&method.updated_at),
        ],
    )?;
    Ok(())
}

/// Rewrite every mutable column of a payout method row.
pub fn update_payout_method(conn: &Connection, method: &PayoutMethod) -> Result<()> {
    let changed = conn.execute(
        "UPDATE payout_methods SET
            slot = ?2, kind = ?3, account_name = ?4, account_number = ?5,
            bank_name = ?6, phone_number = ?7, normalized_id = ?8, status = ?9,
            verified_at = ?10, verified_by = ?11, rejection_reason = ?12,
            is_default = ?13, updated_at = ?14
         WHERE id = ?1",
        params![
            method.id,
            method.slot().as_str(),
            method.details.kind.as_str(),
            method.details.account_name,
            method.details.account_number,
            method.details.bank_name,
            method.details.phone_number,
            method.normalized_id,
            method.status.as_str(),
            method.verified_at.as_ref().map(ts_to_sql),
            method.verified_by,
            method.rejection_reason,
            method.is_default as i64,
            ts_to_sql(&method.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(LedgerError::NotFound(format!("payout method {}", method.id)));
    }
    Ok(())
}

pub fn get_payout_method(
    conn: &Connection,
    seller_id: &str,
    slot: PayoutSlot,
) -> Result<Option<PayoutMethod>> {
    let sql = format!(
        "SELECT {} FROM payout_methods WHERE seller_id = ?1 AND slot = ?2",
        METHOD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![seller_id, slot.as_str()], method_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn get_payout_methods(conn: &Connection, seller_id: &str) -> Result<Vec<PayoutMethod>> {
    let sql = format!(
        "SELECT {} FROM payout_methods WHERE seller_id = ?1 ORDER BY slot",
        METHOD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let methods = stmt
        .query_map(params![seller_id], method_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(methods)
}

pub fn delete_payout_method_row(conn: &Connection, method_id: &str) -> Result<()> {
    conn.execute("DELETE FROM payout_methods WHERE id = ?1", params![method_id])?;
    Ok(())
}

// ============================================================================
// WITHDRAWAL REQUEST ACCESS
// ============================================================================

const WITHDRAWAL_COLUMNS: &str = "id, seller_id, amount_requested, payment_details,
    details_fingerprint, status, withholding_tax, withholding_tax_rate_bp,
    amount_paid_to_seller, seller_balance_before, created_at, finalized_at, finalized_by";

fn withdrawal_from_row(row: &Row) -> rusqlite::Result<WithdrawalRequest> {
    let details_json: String = row.get(3)?;
    let status_str: String = row.get(5)?;
    let created_at: String = row.get(10)?;
    let finalized_at: Option<String> = row.get(11)?;

    Ok(WithdrawalRequest {
        id: row.get(0)?,
        seller_id: row.get(1)?,
        amount_requested: row.get(2)?,
        payment_details: serde_json::from_str(&details_json)
            .map_err(|_| rusqlite::Error::InvalidQuery)?,
        details_fingerprint: row.get(4)?,
        status: WithdrawalStatus::parse(&status_str).ok_or(rusqlite::Error::InvalidQuery)?,
        withholding_tax: row.get(6)?,
        withholding_tax_rate_bp: row.get(7)?,
        amount_paid_to_seller: row.get(8)?,
        seller_balance_before: row.get(9)?,
        created_at: ts_from_sql(&created_at)?,
        finalized_at: opt_ts_from_sql(finalized_at)?,
        finalized_by: row.get(12)?,
    })
}

pub fn insert_withdrawal(conn: &Connection, request: &WithdrawalRequest) -> Result<()> {
    let details_json = serde_json::to_string(&request.payment_details)?;
    conn.execute(
        "INSERT INTO withdrawal_requests (
            id, seller_id, amount_requested, payment_details, details_fingerprint,
            status, withholding_tax, withholding_tax_rate_bp, amount_paid_to_seller,
            seller_balance_before, created_at, finalized_at, finalized_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            request.id,
            request.seller_id,
            request.amount_requested,
            details_json,
            request.details_fingerprint,
            request.status.as_str(),
            request.withholding_tax,
            request.withholding_tax_rate_bp,
            request.amount_paid_to_seller,
            request.seller_balance_before,
            ts_to_sql(&request.created_at),
            request.finalized_at.as_ref().map(ts_to_sql),
            request.finalized_by,
        ],
    )?;
    Ok(())
}

pub fn get_withdrawal(conn: &Connection, withdrawal_id: &str) -> Result<WithdrawalRequest> {
    let sql = format!(
        "SELECT {} FROM withdrawal_requests WHERE id = ?1",
        WITHDRAWAL_COLUMNS
    );
    conn.query_row(&sql, params![withdrawal_id], withdrawal_from_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                LedgerError::NotFound(format!("withdrawal request {}", withdrawal_id))
            }
            other => other.into(),
        })
}

pub fn get_withdrawals_for_seller(
    conn: &Connection,
    seller_id: &str,
) -> Result<Vec<WithdrawalRequest>> {
    let sql = format!(
        "SELECT {} FROM withdrawal_requests WHERE seller_id = ?1 ORDER BY created_at DESC",
        WITHDRAWAL_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let requests = stmt
        .query_map(params![seller_id], withdrawal_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(requests)
}

// ============================================================================
// VERIFICATION HISTORY
// ============================================================================

/// Append one verification event. Insertion order is the history order.
pub fn append_verification_event(
    conn: &Connection,
    seller_id: &str,
    slot: PayoutSlot,
    action: &str,
    actor: &str,
    reason: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO verification_events (seller_id, slot, action, actor, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            seller_id,
            slot.as_str(),
            action,
            actor,
            reason,
            ts_to_sql(&Utc::now()),
        ],
    )?;
    Ok(())
}

/// Verification history entry: (slot, action, actor, reason).
pub type VerificationEvent = (String, String, String, Option<String>);

/// Verification history for a seller, oldest first.
pub fn get_verification_history(
    conn: &Connection,
    seller_id: &str,
) -> Result<Vec<VerificationEvent>> {
    let mut stmt = conn.prepare(
        "SELECT slot, action, actor, reason FROM verification_events
         WHERE seller_id = ?1 ORDER BY seq",
    )?;
    let events = stmt
        .query_map(params![seller_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory_creates_schema() {
        let conn = open_memory().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('sellers', 'payout_methods', 'withdrawal_requests', 'audit_log',
                  'verification_events', 'outbox')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 6);
    }

    #[test]
    fn test_seller_round_trip() {
        let conn = open_memory().unwrap();
        let seller = Seller::new("Ama Mensah", "Ama's Fabrics", "ama@example.com", TaxCategory::Standard);
        insert_seller(&conn, &seller).unwrap();

        let loaded = get_seller(&conn, &seller.id).unwrap();
        assert_eq!(loaded.name, "Ama Mensah");
        assert_eq!(loaded.balance, 0);
        assert_eq!(loaded.tax_category, TaxCategory::Standard);

        let by_email = get_seller_by_email(&conn, "ama@example.com").unwrap();
        assert_eq!(by_email.id, seller.id);
    }

    #[test]
    fn test_get_missing_seller_is_not_found() {
        let conn = open_memory().unwrap();
        let err = get_seller(&conn, "no-such-id").unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn test_payout_method_round_trip() {
        let conn = open_memory().unwrap();
        let seller = Seller::new("Kofi Boateng", "Kofi Electronics", "kofi@example.com", TaxCategory::Standard);
        insert_seller(&conn, &seller).unwrap();

        let details = PayoutDetails::bank("Kofi Boateng", "0011223344", "GCB Bank");
        let method = PayoutMethod::new(
            &seller.id,
            details,
            "bank:gcbbank:0011223344".to_string(),
            PayoutStatus::Pending,
        );
        insert_payout_method(&conn, &method).unwrap();

        let loaded = get_payout_method(&conn, &seller.id, PayoutSlot::Bank)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, method.id);
        assert_eq!(loaded.status, PayoutStatus::Pending);
        assert_eq!(loaded.details.bank_name.as_deref(), Some("GCB Bank"));

        assert!(get_payout_method(&conn, &seller.id, PayoutSlot::Mobile)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_verified_normalized_id_unique_across_sellers() {
        let conn = open_memory().unwrap();
        let a = Seller::new("Ama Mensah", "Ama's Fabrics", "ama@example.com", TaxCategory::Standard);
        let b = Seller::new("Kofi Boateng", "Kofi Electronics", "kofi@example.com", TaxCategory::Standard);
        insert_seller(&conn, &a).unwrap();
        insert_seller(&conn, &b).unwrap();

        let mut m1 = PayoutMethod::new(
            &a.id,
            PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank"),
            "bank:gcbbank:0011223344".to_string(),
            PayoutStatus::Pending,
        );
        m1.status = PayoutStatus::Verified;
        insert_payout_method(&conn, &m1).unwrap();

        let mut m2 = PayoutMethod::new(
            &b.id,
            PayoutDetails::bank("Kofi Boateng", "0011223344", "GCB Bank"),
            "bank:gcbbank:0011223344".to_string(),
            PayoutStatus::Pending,
        );
        m2.status = PayoutStatus::Verified;
        // Partial unique index rejects a second verified holder.
        assert!(insert_payout_method(&conn, &m2).is_err());

        // A non-verified copy of the same identifier is allowed.
        m2.status = PayoutStatus::Pending;
        insert_payout_method(&conn, &m2).unwrap();
    }

    #[test]
    fn test_verification_history_preserves_order() {
        let conn = open_memory().unwrap();
        let seller = Seller::new("Ama Mensah", "Ama's Fabrics", "ama@example.com", TaxCategory::Standard);
        insert_seller(&conn, &seller).unwrap();

        append_verification_event(&conn, &seller.id, PayoutSlot::Bank, "submitted", "seller", None).unwrap();
        append_verification_event(&conn, &seller.id, PayoutSlot::Bank, "approved", "admin-1", None).unwrap();
        append_verification_event(&conn, &seller.id, PayoutSlot::Mobile, "rejected", "admin-1", Some("name mismatch")).unwrap();

        let history = get_verification_history(&conn, &seller.id).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].1, "submitted");
        assert_eq!(history[1].1, "approved");
        assert_eq!(history[2].3.as_deref(), Some("name mismatch"));
    }
}
