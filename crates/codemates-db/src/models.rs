//! Rows as stored in SQLite. Handlers convert these into `codemates_types::api` shapes.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

pub struct ProfileRow {
    pub id: String,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct SettingsRow {
    pub friend_requests: bool,
    pub messages: bool,
    pub coding_invites: bool,
}

#[derive(Debug, Clone)]
pub struct FriendshipRow {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub read: bool,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub host_id: String,
    pub language: String,
    pub code: String,
    pub active: bool,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ParticipantRow {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub joined_at: String,
}

pub struct ChallengeRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: String,
    pub points: i64,
    pub problem_statement: String,
    pub test_cases: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AttemptRow {
    pub id: String,
    pub challenge_id: String,
    pub user_id: String,
    pub language: String,
    pub code: String,
    pub status: String,
    pub points_earned: Option<i64>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

/// One completed attempt's contribution to the leaderboard.
#[derive(Debug, Clone)]
pub struct ScoreRow {
    pub user_id: String,
    pub status: String,
    pub points_earned: Option<i64>,
}
