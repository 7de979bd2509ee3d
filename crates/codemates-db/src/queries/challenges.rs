use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::{AttemptRow, ChallengeRow, ScoreRow};
use crate::{Database, NOW};

const CHALLENGE_COLUMNS: &str = "id, title, description, difficulty, points, problem_statement, test_cases";
const ATTEMPT_COLUMNS: &str =
    "id, challenge_id, user_id, language, code, status, points_earned, created_at, completed_at";

impl Database {
    // -- Catalog --

    pub fn list_challenges(&self) -> Result<Vec<ChallengeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHALLENGE_COLUMNS} FROM challenges ORDER BY points, title"
            ))?;
            let rows = stmt
                .query_map([], challenge_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_challenge(&self, id: &str) -> Result<Option<ChallengeRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = ?1"),
                    [id],
                    challenge_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Attempts --

    /// Create an attempt plus its participant rows in one transaction.
    /// `participants` are `(participant_row_id, user_id)` pairs.
    pub fn create_attempt(
        &self,
        id: &str,
        challenge_id: &str,
        user_id: &str,
        language: &str,
        code: &str,
        participants: &[(String, String)],
    ) -> Result<AttemptRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO challenge_attempts (id, challenge_id, user_id, language, code, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'in_progress')",
                (id, challenge_id, user_id, language, code),
            )?;
            for (participant_id, participant_user) in participants {
                tx.execute(
                    "INSERT OR IGNORE INTO challenge_participants (id, attempt_id, user_id) VALUES (?1, ?2, ?3)",
                    (participant_id, id, participant_user),
                )?;
            }
            let row = query_attempt(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("attempt {} vanished inside its own transaction", id))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_attempt(&self, id: &str) -> Result<Option<AttemptRow>> {
        self.with_conn(|conn| query_attempt(conn, id))
    }

    /// Attempts the user owns or was invited to, oldest first.
    pub fn get_attempts_for_user(&self, user_id: &str) -> Result<Vec<AttemptRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ATTEMPT_COLUMNS} FROM challenge_attempts
                 WHERE user_id = ?1
                    OR id IN (SELECT attempt_id FROM challenge_participants WHERE user_id = ?1)
                 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt
                .query_map([user_id], attempt_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// User ids of the invitees of a group attempt, in join order.
    pub fn get_attempt_participants(&self, attempt_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM challenge_participants WHERE attempt_id = ?1 ORDER BY joined_at, rowid",
            )?;
            let rows = stmt
                .query_map([attempt_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Only in-progress attempts accept code. Returns false otherwise.
    pub fn update_attempt_code(&self, id: &str, code: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE challenge_attempts SET code = ?2 WHERE id = ?1 AND status = 'in_progress'",
                [id, code],
            )?;
            Ok(changed == 1)
        })
    }

    /// `in_progress -> completed`. Returns the updated row, or `None` when the
    /// attempt was not in progress.
    pub fn complete_attempt(&self, id: &str, points_earned: i64) -> Result<Option<AttemptRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE challenge_attempts
                     SET status = 'completed', points_earned = ?2, completed_at = {NOW}
                     WHERE id = ?1 AND status = 'in_progress'"
                ),
                (id, points_earned),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_attempt(conn, id)
        })
    }

    /// Points of every completed attempt, in insertion order.
    pub fn completed_scores(&self) -> Result<Vec<ScoreRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, status, points_earned FROM challenge_attempts
                 WHERE status = 'completed'
                 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ScoreRow {
                        user_id: row.get(0)?,
                        status: row.get(1)?,
                        points_earned: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_attempt(conn: &Connection, id: &str) -> Result<Option<AttemptRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {ATTEMPT_COLUMNS} FROM challenge_attempts WHERE id = ?1"),
            [id],
            attempt_from_row,
        )
        .optional()?;
    Ok(row)
}

fn challenge_from_row(row: &Row<'_>) -> rusqlite::Result<ChallengeRow> {
    Ok(ChallengeRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        difficulty: row.get(3)?,
        points: row.get(4)?,
        problem_statement: row.get(5)?,
        test_cases: row.get(6)?,
    })
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<AttemptRow> {
    Ok(AttemptRow {
        id: row.get(0)?,
        challenge_id: row.get(1)?,
        user_id: row.get(2)?,
        language: row.get(3)?,
        code: row.get(4)?,
        status: row.get(5)?,
        points_earned: row.get(6)?,
        created_at: row.get(7)?,
        completed_at: row.get(8)?,
    })
}
