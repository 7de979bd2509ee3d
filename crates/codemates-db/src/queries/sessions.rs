use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::{ParticipantRow, SessionRow};
use crate::{Database, NOW};

const SESSION_COLUMNS: &str = "id, host_id, language, code, active, version, created_at, updated_at";

/// Outcome of a write to a session's shared code field.
#[derive(Debug)]
pub enum CodeUpdate {
    Applied(SessionRow),
    /// `base_version` was stale; carries the current state.
    VersionMismatch(SessionRow),
    NotFound,
}

impl Database {
    /// Create a session and all of its membership rows in one transaction.
    /// `members` are `(participant_row_id, user_id)` pairs, host included.
    pub fn create_session(
        &self,
        id: &str,
        host_id: &str,
        language: &str,
        code: &str,
        members: &[(String, String)],
    ) -> Result<SessionRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO coding_sessions (id, host_id, language, code) VALUES (?1, ?2, ?3, ?4)",
                (id, host_id, language, code),
            )?;
            for (participant_id, user_id) in members {
                tx.execute(
                    "INSERT OR IGNORE INTO session_participants (id, session_id, user_id) VALUES (?1, ?2, ?3)",
                    (participant_id, id, user_id),
                )?;
            }
            let row = query_session(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("session {} vanished inside its own transaction", id))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| query_session(conn, id))
    }

    /// Sessions the user is a member of, oldest first.
    pub fn get_sessions_for_user(&self, user_id: &str) -> Result<Vec<SessionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM coding_sessions
                 WHERE id IN (SELECT session_id FROM session_participants WHERE user_id = ?1)
                 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt
                .query_map([user_id], session_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Participants in join order.
    pub fn get_session_participants(&self, session_id: &str) -> Result<Vec<ParticipantRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, user_id, joined_at FROM session_participants
                 WHERE session_id = ?1
                 ORDER BY joined_at, rowid",
            )?;
            let rows = stmt
                .query_map([session_id], |row| {
                    Ok(ParticipantRow {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        user_id: row.get(2)?,
                        joined_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn is_session_participant(&self, session_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM session_participants WHERE session_id = ?1 AND user_id = ?2",
                    [session_id, user_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Append a membership row. Returns false if the user was already a member.
    pub fn add_session_participant(&self, id: &str, session_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO session_participants (id, session_id, user_id) VALUES (?1, ?2, ?3)",
                [id, session_id, user_id],
            )?;
            Ok(changed == 1)
        })
    }

    /// Overwrite code and language. With `base_version` this is a
    /// compare-and-swap on `version`; without it, last write wins.
    pub fn update_session_code(
        &self,
        id: &str,
        code: &str,
        language: &str,
        base_version: Option<i64>,
    ) -> Result<CodeUpdate> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(current) = query_session(&tx, id)? else {
                return Ok(CodeUpdate::NotFound);
            };
            if base_version.is_some_and(|v| v != current.version) {
                return Ok(CodeUpdate::VersionMismatch(current));
            }

            tx.execute(
                &format!(
                    "UPDATE coding_sessions
                     SET code = ?2, language = ?3, version = version + 1, updated_at = {NOW}
                     WHERE id = ?1"
                ),
                (id, code, language),
            )?;
            let updated = query_session(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("session {} vanished during update", id))?;
            tx.commit()?;
            Ok(CodeUpdate::Applied(updated))
        })
    }
}

fn query_session(conn: &Connection, id: &str) -> Result<Option<SessionRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM coding_sessions WHERE id = ?1"),
            [id],
            session_from_row,
        )
        .optional()?;
    Ok(row)
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        host_id: row.get(1)?,
        language: row.get(2)?,
        code: row.get(3)?,
        active: row.get(4)?,
        version: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
