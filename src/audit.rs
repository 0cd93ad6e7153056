// 📜 Audit Trail - Append-only record of every balance-affecting action
//
// Audit rows are written INSIDE the caller's transaction: a bucket mutation
// and its audit entry commit or roll back together. Entries are never
// updated or deleted, even when the seller or withdrawal they reference is
// later removed.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::db::{ts_from_sql, ts_to_sql};
use crate::entities::seller::Actor;
use crate::error::Result;

/// Immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub actor: String,
    pub actor_role: String,
    pub action: String,
    pub seller_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before_status: Option<String>,
    pub after_status: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        actor: &Actor,
        action: &str,
        seller_id: &str,
        entity_type: &str,
        entity_id: &str,
        metadata: serde_json::Value,
    ) -> Self {
        AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            actor: actor.id.clone(),
            actor_role: actor.role.as_str().to_string(),
            action: action.to_string(),
            seller_id: seller_id.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            before_status: None,
            after_status: None,
            metadata,
            created_at: Utc::now(),
        }
    }

    pub fn with_status_change(mut self, before: Option<&str>, after: Option<&str>) -> Self {
        self.before_status = before.map(str::to_string);
        self.after_status = after.map(str::to_string);
        self
    }
}

// ============================================================================
// AUDIT SINK
// ============================================================================

/// Append-only audit recorder. The SQLite implementation writes into the
/// same database (and transaction) as the primary mutation.
pub trait AuditSink {
    fn append(&self, conn: &Connection, entry: &AuditLogEntry) -> Result<()>;
}

pub struct SqliteAuditSink;

impl AuditSink for SqliteAuditSink {
    fn append(&self, conn: &Connection, entry: &AuditLogEntry) -> Result<()> {
        let metadata_json = serde_json::to_string(&entry.metadata)?;
        conn.execute(
            "INSERT INTO audit_log (
                id, actor, actor_role, action, seller_id, entity_type, entity_id,
                before_status, after_status, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.id,
                entry.actor,
                entry.actor_role,
                entry.action,
                entry.seller_id,
                entry.entity_type,
                entry.entity_id,
                entry.before_status,
                entry.after_status,
                metadata_json,
                ts_to_sql(&entry.created_at),
            ],
        )?;
        Ok(())
    }
}

/// Convenience wrapper used by the engine modules.
pub fn append_audit(conn: &Connection, entry: &AuditLogEntry) -> Result<()> {
    SqliteAuditSink.append(conn, entry)
}

/// Audit entries for a seller, oldest first.
pub fn entries_for_seller(conn: &Connection, seller_id: &str) -> Result<Vec<AuditLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, actor, actor_role, action, seller_id, entity_type, entity_id,
                before_status, after_status, metadata, created_at
         FROM audit_log WHERE seller_id = ?1 ORDER BY created_at",
    )?;
    let entries = stmt
        .query_map(params![seller_id], |row| {
            let metadata_json: String = row.get(9)?;
            let created_at: String = row.get(10)?;
            Ok(AuditLogEntry {
                id: row.get(0)?,
                actor: row.get(1)?,
                actor_role: row.get(2)?,
                action: row.get(3)?,
                seller_id: row.get(4)?,
                entity_type: row.get(5)?,
                entity_id: row.get(6)?,
                before_status: row.get(7)?,
                after_status: row.get(8)?,
                metadata: serde_json::from_str(&metadata_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                created_at: ts_from_sql(&created_at)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Count of audit entries matching a seller + action, used by idempotency
/// tests and admin tooling.
pub fn count_entries(conn: &Connection, seller_id: &str, action: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM audit_log WHERE seller_id = ?1 AND action = ?2",
        params![seller_id, action],
        |row| row.get(0),
    )?;
    Ok(count)
}
