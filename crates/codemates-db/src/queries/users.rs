use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use codemates_types::api::UpdateSettingsRequest;

use crate::models::{ProfileRow, SettingsRow, UserRow};
use crate::queries::placeholders;
use crate::{Database, NOW};

impl Database {
    // -- Accounts --

    /// Create the auth user, its profile and default notification settings atomically.
    pub fn create_account(
        &self,
        id: &str,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, email, password_hash) VALUES (?1, ?2, ?3)",
                (id, email, password_hash),
            )?;
            tx.execute(
                "INSERT INTO profiles (id, username) VALUES (?1, ?2)",
                (id, username),
            )?;
            tx.execute("INSERT INTO notification_settings (user_id) VALUES (?1)", [id])?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Profiles --

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "id", id))
    }

    pub fn get_profile_by_username(&self, username: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "username", username))
    }

    /// Batch-resolve user ids to usernames. Unknown ids are simply absent.
    pub fn get_usernames(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, username FROM profiles WHERE id IN ({})",
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            Ok(rows)
        })
    }

    /// Patch a profile. `None` fields are left untouched.
    pub fn update_profile(
        &self,
        id: &str,
        username: Option<&str>,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Option<ProfileRow>> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE profiles SET
                    username = COALESCE(?2, username),
                    bio = COALESCE(?3, bio),
                    avatar_url = COALESCE(?4, avatar_url),
                    updated_at = {NOW}
                 WHERE id = ?1"
            );
            let changed = conn.execute(&sql, (id, username, bio, avatar_url))?;
            if changed == 0 {
                return Ok(None);
            }
            query_profile(conn, "id", id)
        })
    }

    // -- Notification settings --

    pub fn get_settings(&self, user_id: &str) -> Result<SettingsRow> {
        self.with_conn(|conn| query_settings(conn, user_id))
    }

    pub fn update_settings(&self, user_id: &str, req: &UpdateSettingsRequest) -> Result<SettingsRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notification_settings (user_id, friend_requests, messages, coding_invites)
                 VALUES (?1, COALESCE(?2, 1), COALESCE(?3, 1), COALESCE(?4, 1))
                 ON CONFLICT(user_id) DO UPDATE SET
                    friend_requests = COALESCE(?2, friend_requests),
                    messages = COALESCE(?3, messages),
                    coding_invites = COALESCE(?4, coding_invites)",
                (user_id, req.friend_requests, req.messages, req.coding_invites),
            )?;
            query_settings(conn, user_id)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, email, password_hash, created_at FROM users WHERE {column} = ?1");
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn query_profile(conn: &Connection, column: &str, value: &str) -> Result<Option<ProfileRow>> {
    let sql = format!(
        "SELECT id, username, bio, avatar_url, created_at, updated_at FROM profiles WHERE {column} = ?1"
    );
    let row = conn.query_row(&sql, [value], profile_from_row).optional()?;
    Ok(row)
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        username: row.get(1)?,
        bio: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn query_settings(conn: &Connection, user_id: &str) -> Result<SettingsRow> {
    let row = conn
        .query_row(
            "SELECT friend_requests, messages, coding_invites FROM notification_settings WHERE user_id = ?1",
            [user_id],
            |row| {
                Ok(SettingsRow {
                    friend_requests: row.get(0)?,
                    messages: row.get(1)?,
                    coding_invites: row.get(2)?,
                })
            },
        )
        .optional()?;

    // No row means nothing was ever switched off
    Ok(row.unwrap_or(SettingsRow {
        friend_requests: true,
        messages: true,
        coding_invites: true,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{new_id, user};
    use crate::{Database, is_unique_violation};

    #[test]
    fn duplicate_username_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "alex_dev");

        let err = db
            .create_account(&new_id(), "other@example.com", "alex_dev", "hash")
            .unwrap_err();
        assert!(is_unique_violation(&err));

        // The failed signup left no dangling auth user behind
        assert!(db.get_user_by_email("other@example.com").unwrap().is_none());
    }

    #[test]
    fn batched_username_lookup_skips_unknown_ids() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alex_dev");
        let b = user(&db, "sarah_codes");

        let names = db.get_usernames(&[a.clone(), b.clone(), new_id()]).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[&a], "alex_dev");
        assert_eq!(names[&b], "sarah_codes");
    }

    #[test]
    fn profile_patch_keeps_untouched_fields() {
        let db = Database::open_in_memory().unwrap();
        let id = user(&db, "mike_js");

        db.update_profile(&id, None, Some("hello"), None).unwrap();
        let p = db.update_profile(&id, Some("mike_rs"), None, None).unwrap().unwrap();
        assert_eq!(p.username, "mike_rs");
        assert_eq!(p.bio.as_deref(), Some("hello"));

        assert!(db.update_profile(&new_id(), Some("ghost"), None, None).unwrap().is_none());
    }

    #[test]
    fn settings_patch() {
        let db = Database::open_in_memory().unwrap();
        let id = user(&db, "emma_py");

        let s = db.get_settings(&id).unwrap();
        assert!(s.friend_requests && s.messages && s.coding_invites);

        let req = codemates_types::api::UpdateSettingsRequest {
            messages: Some(false),
            ..Default::default()
        };
        let s = db.update_settings(&id, &req).unwrap();
        assert!(s.friend_requests);
        assert!(!s.messages);
        assert!(s.coding_invites);
    }
}
