use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::store::{fmt_utc, fmt_utc_opt, parse_utc, parse_utc_opt, Store};
use crate::types::{ActorType, NewNotification, Notification, RecipientStatus};

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let actor_type = ActorType::from_str(&row.get::<_, String>(3)?).unwrap_or_default();
    Ok(Notification {
        id: row.get(0)?,
        code: row.get(1)?,
        entity_id: row.get(2)?,
        actor_type,
        actor_id: row.get(4)?,
        metadata: row.get(5)?,
        expires_at: parse_utc_opt(6, row.get(6)?)?,
        created_at: parse_utc(7, &row.get::<_, String>(7)?)?,
    })
}

impl Store {
    /// Persist a notification header plus one PENDING recipient row per id,
    /// atomically. Returns the new notification id.
    #[instrument(skip(self, new), fields(code = %new.code, recipients = new.recipient_ids.len()))]
    pub fn insert_notification(&self, new: &NewNotification, now: DateTime<Utc>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let metadata = new.metadata.as_ref().map(|m| m.to_string());

        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO notifications
             (id, code, entity_id, actor_type, actor_id, metadata, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                id,
                new.code,
                new.entity_id,
                new.actor_type.to_string(),
                new.actor_id,
                metadata,
                fmt_utc_opt(new.expires_at),
                fmt_utc(now),
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO notification_recipients
                 (id, notification_id, recipient_id, status)
                 VALUES (?1, ?2, ?3, 'pending')",
            )?;
            for recipient in &new.recipient_ids {
                stmt.execute(rusqlite::params![
                    Uuid::new_v4().to_string(),
                    id,
                    recipient
                ])?;
            }
        }
        tx.commit()?;
        Ok(id)
    }

    /// Notifications whose expiry has passed and that still carry at least
    /// one PENDING recipient.
    pub fn list_expiring_notifications(&self, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT n.id, n.code, n.entity_id, n.actor_type, n.actor_id,
                    n.metadata, n.expires_at, n.created_at
             FROM notifications n
             WHERE n.expires_at IS NOT NULL
               AND n.expires_at <= ?1
               AND EXISTS (SELECT 1 FROM notification_recipients nr
                           WHERE nr.notification_id = n.id AND nr.status = 'pending')
             ORDER BY n.expires_at",
        )?;
        let rows = stmt.query_map(rusqlite::params![fmt_utc(now)], row_to_notification)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Flip every still-PENDING recipient of a notification to EXPIRED.
    /// Rows in any other state are untouched, so the call is idempotent.
    pub fn expire_pending_recipients(&self, notification_id: &str) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "UPDATE notification_recipients SET status = 'expired'
             WHERE notification_id = ?1 AND status = 'pending'",
            rusqlite::params![notification_id],
        )?;
        Ok(changed)
    }

    /// Dispatcher write path: mark one recipient delivered.
    pub fn mark_recipient_delivered(
        &self,
        notification_id: &str,
        recipient_id: &str,
        delivered_at: DateTime<Utc>,
    ) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "UPDATE notification_recipients SET status = 'delivered', delivered_at = ?3
             WHERE notification_id = ?1 AND recipient_id = ?2 AND status = 'pending'",
            rusqlite::params![notification_id, recipient_id, fmt_utc(delivered_at)],
        )?;
        Ok(changed)
    }

    /// All notifications created for an entity, oldest first.
    pub fn list_notifications_for_entity(&self, entity_id: &str) -> Result<Vec<Notification>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, code, entity_id, actor_type, actor_id, metadata, expires_at, created_at
             FROM notifications WHERE entity_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(rusqlite::params![entity_id], row_to_notification)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// (recipient_id, status) pairs for a notification — inspection helper.
    pub fn list_recipient_statuses(
        &self,
        notification_id: &str,
    ) -> Result<Vec<(String, RecipientStatus)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT recipient_id, status FROM notification_recipients
             WHERE notification_id = ?1 ORDER BY recipient_id",
        )?;
        let rows = stmt.query_map(rusqlite::params![notification_id], |row| {
            let recipient: String = row.get(0)?;
            let status = RecipientStatus::from_str(&row.get::<_, String>(1)?).unwrap_or_default();
            Ok((recipient, status))
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}
