use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use crate::Database;
use crate::models::MessageRow;

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, content, read, created_at";

impl Database {
    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, content) VALUES (?1, ?2, ?3, ?4)",
                (id, sender_id, receiver_id, content),
            )?;
            let row = conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                [id],
                message_from_row,
            )?;
            Ok(row)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                    [id],
                    message_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Every message `user_id` sent or received, oldest first.
    /// With `counterpart`, only the conversation between the two users.
    pub fn get_messages_for_user(&self, user_id: &str, counterpart: Option<&str>) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let rows = match counterpart {
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages
                         WHERE sender_id = ?1 OR receiver_id = ?1
                         ORDER BY created_at ASC, rowid ASC"
                    ))?;
                    let rows = stmt
                        .query_map([user_id], message_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                Some(other) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages
                         WHERE (sender_id = ?1 AND receiver_id = ?2)
                            OR (sender_id = ?2 AND receiver_id = ?1)
                         ORDER BY created_at ASC, rowid ASC"
                    ))?;
                    let rows = stmt
                        .query_map([user_id, other], message_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(rows)
        })
    }

    /// Set the read flag. Only the receiver may do this; returns false otherwise.
    pub fn mark_message_read(&self, id: &str, receiver_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET read = 1 WHERE id = ?1 AND receiver_id = ?2",
                [id, receiver_id],
            )?;
            Ok(changed == 1)
        })
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        read: row.get(4)?,
        created_at: row.get(5)?,
    })
}
