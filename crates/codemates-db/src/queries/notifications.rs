use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use codemates_types::models::NotificationKind;

use crate::Database;
use crate::models::NotificationRow;

const NOTIFICATION_COLUMNS: &str = "id, user_id, type, title, message, read, created_at";

impl Database {
    /// Insert a notification unless the recipient switched this kind off.
    /// Returns the stored row, or `None` when suppressed.
    pub fn create_notification(
        &self,
        id: &str,
        user_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> Result<Option<NotificationRow>> {
        self.with_conn_mut(|conn| {
            let column = kind.preference().column();
            let enabled: Option<bool> = conn
                .query_row(
                    &format!("SELECT {column} FROM notification_settings WHERE user_id = ?1"),
                    [user_id],
                    |r| r.get(0),
                )
                .optional()?;
            if enabled == Some(false) {
                return Ok(None);
            }

            conn.execute(
                "INSERT INTO notifications (id, user_id, type, title, message) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, user_id, kind.as_str(), title, message),
            )?;
            let row = conn.query_row(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
                [id],
                notification_from_row,
            )?;
            Ok(Some(row))
        })
    }

    /// Newest first.
    pub fn get_notifications(&self, user_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], notification_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                [id, user_id],
            )?;
            Ok(changed == 1)
        })
    }

    /// Mark every unread notification read. Returns the ids that flipped.
    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ids = {
                let mut stmt =
                    tx.prepare("SELECT id FROM notifications WHERE user_id = ?1 AND read = 0")?;
                let ids = stmt
                    .query_map([user_id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                ids
            };
            tx.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id],
            )?;
            tx.commit()?;
            Ok(ids)
        })
    }
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        read: row.get(5)?,
        created_at: row.get(6)?,
    })
}
