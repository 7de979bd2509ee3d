use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use crate::Database;
use crate::models::FriendshipRow;

const FRIENDSHIP_COLUMNS: &str = "id, user_id, friend_id, status, created_at";

impl Database {
    /// Insert a pending edge `user_id -> friend_id`.
    /// A second request for the same pair fails with a unique violation.
    pub fn insert_friend_request(&self, id: &str, user_id: &str, friend_id: &str) -> Result<FriendshipRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO friendships (id, user_id, friend_id, status) VALUES (?1, ?2, ?3, 'pending')",
                (id, user_id, friend_id),
            )?;
            let row = conn.query_row(
                &format!("SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE id = ?1"),
                [id],
                friendship_from_row,
            )?;
            Ok(row)
        })
    }

    pub fn get_friendship(&self, id: &str) -> Result<Option<FriendshipRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE id = ?1"),
                    [id],
                    friendship_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// The directional edge `user_id -> friend_id`, if any.
    pub fn find_friendship(&self, user_id: &str, friend_id: &str) -> Result<Option<FriendshipRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE user_id = ?1 AND friend_id = ?2"
                    ),
                    [user_id, friend_id],
                    friendship_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Every edge touching `user_id`, in either direction, oldest first.
    pub fn get_friendships_for_user(&self, user_id: &str) -> Result<Vec<FriendshipRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FRIENDSHIP_COLUMNS} FROM friendships
                 WHERE user_id = ?1 OR friend_id = ?1
                 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt
                .query_map([user_id], friendship_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip a pending edge to accepted. Returns false if it was not pending.
    pub fn accept_friend_request(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE friendships SET status = 'accepted' WHERE id = ?1 AND status = 'pending'",
                [id],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn delete_friendship(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM friendships WHERE id = ?1", [id])?;
            Ok(changed == 1)
        })
    }

    /// Remove accepted edges between two users in both directions.
    /// Returns the deleted rows.
    pub fn delete_friendships_between(&self, a: &str, b: &str) -> Result<Vec<FriendshipRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let rows = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {FRIENDSHIP_COLUMNS} FROM friendships
                     WHERE status = 'accepted'
                       AND ((user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1))"
                ))?;
                let rows = stmt
                    .query_map([a, b], friendship_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            };
            for row in &rows {
                tx.execute("DELETE FROM friendships WHERE id = ?1", [&row.id])?;
            }
            tx.commit()?;
            Ok(rows)
        })
    }

    /// True if an accepted edge links the two users in either direction.
    pub fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM friendships
                 WHERE status = 'accepted'
                   AND ((user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1))",
                [a, b],
                |r| r.get(0),
            )?;
            Ok(count > 0)
        })
    }
}

fn friendship_from_row(row: &Row<'_>) -> rusqlite::Result<FriendshipRow> {
    Ok(FriendshipRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        friend_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::test_support::{new_id, user};
    use crate::{Database, is_unique_violation};

    #[test]
    fn duplicate_request_is_rejected_without_second_row() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex_dev");
        let b = user(&db, "sarah_codes");

        db.insert_friend_request(&new_id(), &a, &b).unwrap();
        let err = db.insert_friend_request(&new_id(), &a, &b).unwrap_err();
        assert!(is_unique_violation(&err));

        assert_eq!(db.get_friendships_for_user(&b).unwrap().len(), 1);
    }

    #[test]
    fn accept_only_applies_to_pending() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex_dev");
        let b = user(&db, "sarah_codes");
        let id = new_id();

        db.insert_friend_request(&id, &a, &b).unwrap();
        assert!(!db.are_friends(&a, &b).unwrap());
        assert!(db.accept_friend_request(&id).unwrap());
        assert!(!db.accept_friend_request(&id).unwrap());
        assert!(db.are_friends(&b, &a).unwrap());
    }

    #[test]
    fn unfriend_removes_both_directions() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex_dev");
        let b = user(&db, "sarah_codes");
        let ab = new_id();
        let ba = new_id();

        db.insert_friend_request(&ab, &a, &b).unwrap();
        db.insert_friend_request(&ba, &b, &a).unwrap();
        db.accept_friend_request(&ab).unwrap();
        db.accept_friend_request(&ba).unwrap();

        let removed = db.delete_friendships_between(&b, &a).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(db.get_friendships_for_user(&a).unwrap().is_empty());
    }

    #[test]
    fn self_edge_is_refused_by_the_store() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex_dev");
        assert!(db.insert_friend_request(&new_id(), &a, &a).is_err());
    }
}
