// 📮 Notification Outbox - Transactional enqueue, best-effort dispatch
//
// "Never fail the main operation" must not become "silently lose the
// notification". Engine modules enqueue a notification row inside the same
// transaction as the primary write; a dispatcher drains the table after
// commit. Delivery failure increments `attempts` and leaves the row for the
// next drain; it never propagates to the caller.

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::ts_to_sql;
use crate::error::Result;

/// An event a user should hear about (payout verified, withdrawal requested).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient: String,
    pub recipient_role: String,
    pub event_kind: String,
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn new(recipient: &str, recipient_role: &str, event_kind: &str, payload: serde_json::Value) -> Self {
        Notification {
            id: uuid::Uuid::new_v4().to_string(),
            recipient: recipient.to_string(),
            recipient_role: recipient_role.to_string(),
            event_kind: event_kind.to_string(),
            payload,
        }
    }
}

// ============================================================================
// NOTIFICATION SINK
// ============================================================================

/// Delivery backend (push/email/SMS lives behind this). Failures are
/// reported via Err but MUST NOT propagate past the dispatcher.
pub trait NotificationSink {
    fn notify(&self, notification: &Notification) -> std::result::Result<(), String>;
}

/// Discards everything. Default when no delivery backend is wired up.
pub struct NoopNotificationSink;

impl NotificationSink for NoopNotificationSink {
    fn notify(&self, _notification: &Notification) -> std::result::Result<(), String> {
        Ok(())
    }
}

// ============================================================================
// OUTBOX
// ============================================================================

pub struct Outbox;

impl Outbox {
    /// Enqueue a notification. Call inside the primary transaction so the
    /// notification commits or rolls back with the main write.
    pub fn enqueue(conn: &Connection, notification: &Notification) -> Result<()> {
        let payload_json = serde_json::to_string(&notification.payload)?;
        conn.execute(
            "INSERT INTO outbox (id, recipient, recipient_role, event_kind, payload, attempts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                notification.id,
                notification.recipient,
                notification.recipient_role,
                notification.event_kind,
                payload_json,
                ts_to_sql(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Deliver every undispatched notification. Returns the number
    /// delivered. Failed deliveries stay queued with an incremented
    /// attempt counter.
    pub fn drain(conn: &Connection, sink: &dyn NotificationSink) -> Result<usize> {
        let mut stmt = conn.prepare(
            "SELECT id, recipient, recipient_role, event_kind, payload
             FROM outbox WHERE dispatched_at IS NULL ORDER BY created_at",
        )?;
        let pending = stmt
            .query_map([], |row| {
                let payload_json: String = row.get(4)?;
                Ok(Notification {
                    id: row.get(0)?,
                    recipient: row.get(1)?,
                    recipient_role: row.get(2)?,
                    event_kind: row.get(3)?,
                    payload: serde_json::from_str(&payload_json)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut delivered = 0;
        for notification in &pending {
            match sink.notify(notification) {
                Ok(()) => {
                    conn.execute(
                        "UPDATE outbox SET dispatched_at = ?2 WHERE id = ?1",
                        params![notification.id, ts_to_sql(&Utc::now())],
                    )?;
                    delivered += 1;
                }
                Err(e) => {
                    warn!(
                        notification_id = %notification.id,
                        event_kind = %notification.event_kind,
                        error = %e,
                        "notification delivery failed; will retry on next drain"
                    );
                    conn.execute(
                        "UPDATE outbox SET attempts = attempts + 1 WHERE id = ?1",
                        params![notification.id],
                    )?;
                }
            }
        }
        Ok(delivered)
    }

    /// Number of undelivered notifications.
    pub fn pending_count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM outbox WHERE dispatched_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
