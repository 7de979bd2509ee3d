use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE profiles (
                id          TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                username    TEXT NOT NULL UNIQUE,
                bio         TEXT,
                avatar_url  TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE notification_settings (
                user_id         TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                friend_requests INTEGER NOT NULL DEFAULT 1,
                messages        INTEGER NOT NULL DEFAULT 1,
                coding_invites  INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE friendships (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                friend_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status      TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'accepted')),
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(user_id, friend_id),
                CHECK (user_id <> friend_id)
            );

            CREATE INDEX idx_friendships_friend ON friendships(friend_id);

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                receiver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content     TEXT NOT NULL,
                read        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_messages_sender ON messages(sender_id, created_at);
            CREATE INDEX idx_messages_receiver ON messages(receiver_id, created_at);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                type        TEXT NOT NULL,
                title       TEXT NOT NULL,
                message     TEXT NOT NULL,
                read        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            CREATE TABLE coding_sessions (
                id          TEXT PRIMARY KEY,
                host_id     TEXT NOT NULL REFERENCES users(id),
                language    TEXT NOT NULL,
                code        TEXT NOT NULL DEFAULT '',
                active      INTEGER NOT NULL DEFAULT 1,
                version     INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE session_participants (
                id          TEXT PRIMARY KEY,
                session_id  TEXT NOT NULL REFERENCES coding_sessions(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                joined_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(session_id, user_id)
            );

            CREATE TABLE challenges (
                id                  TEXT PRIMARY KEY,
                title               TEXT NOT NULL,
                description         TEXT,
                difficulty          TEXT NOT NULL,
                points              INTEGER NOT NULL,
                problem_statement   TEXT NOT NULL,
                test_cases          TEXT,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE challenge_attempts (
                id              TEXT PRIMARY KEY,
                challenge_id    TEXT NOT NULL REFERENCES challenges(id),
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                language        TEXT NOT NULL,
                code            TEXT NOT NULL DEFAULT '',
                status          TEXT NOT NULL DEFAULT 'in_progress',
                points_earned   INTEGER,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                completed_at    TEXT
            );

            CREATE INDEX idx_attempts_status ON challenge_attempts(status);

            CREATE TABLE challenge_participants (
                id          TEXT PRIMARY KEY,
                attempt_id  TEXT NOT NULL REFERENCES challenge_attempts(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                joined_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(attempt_id, user_id)
            );

            INSERT INTO challenges (id, title, description, difficulty, points, problem_statement, test_cases) VALUES
                ('00000000-0000-0000-0000-00000000c001', 'Two Sum Problem',
                 'Find two numbers that add up to a target.', 'Easy', 100,
                 'Given an array of integers nums and an integer target, return the indices of the two numbers that add up to target.',
                 '[{\"input\":\"[2,7,11,15], 9\",\"output\":\"[0,1]\"},{\"input\":\"[3,2,4], 6\",\"output\":\"[1,2]\"}]'),
                ('00000000-0000-0000-0000-00000000c002', 'Binary Tree Traversal',
                 'Walk a binary tree in order.', 'Medium', 200,
                 'Given the root of a binary tree, return the inorder traversal of its node values.',
                 '[{\"input\":\"[1,null,2,3]\",\"output\":\"[1,3,2]\"}]'),
                ('00000000-0000-0000-0000-00000000c003', 'Dynamic Programming - Knapsack',
                 'Classic 0/1 knapsack.', 'Hard', 300,
                 'Given item weights, item values and a capacity, return the maximum total value that fits in the knapsack.',
                 '[{\"input\":\"[1,3,4,5], [1,4,5,7], 7\",\"output\":\"9\"}]'),
                ('00000000-0000-0000-0000-00000000c004', 'String Manipulation',
                 'Reverse the words of a sentence.', 'Easy', 100,
                 'Given a string s, return the words of s in reverse order separated by a single space.',
                 '[{\"input\":\"the sky is blue\",\"output\":\"blue is sky the\"}]');

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
