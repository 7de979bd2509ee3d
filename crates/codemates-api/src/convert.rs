//! Storage rows -> wire types.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use codemates_db::models::{
    AttemptRow, ChallengeRow, FriendshipRow, MessageRow, NotificationRow, ParticipantRow, ProfileRow,
    SessionRow, SettingsRow,
};
use codemates_types::api::{
    AttemptResponse, ChallengeResponse, FriendRequestResponse, MessageResponse, NotificationResponse,
    ParticipantResponse, ProfileResponse, SessionResponse, SettingsResponse,
};
use codemates_types::models::{AttemptStatus, FriendshipStatus, Language};

/// Shown wherever a profile lookup misses.
pub const UNKNOWN_USERNAME: &str = "Unknown";

pub fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

pub fn parse_time(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand may use SQLite's "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

fn parse_or<T: FromStr<Err = String> + Copy>(raw: &str, fallback: T) -> T {
    raw.parse().unwrap_or_else(|e| {
        warn!("{}", e);
        fallback
    })
}

pub fn username_or_unknown(usernames: &HashMap<String, String>, id: &str) -> String {
    usernames
        .get(id)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_USERNAME.to_string())
}

pub fn language(raw: &str) -> Language {
    parse_or(raw, Language::default())
}

pub fn profile(row: ProfileRow) -> ProfileResponse {
    ProfileResponse {
        id: parse_id(&row.id),
        username: row.username,
        bio: row.bio,
        avatar_url: row.avatar_url,
        created_at: parse_time(&row.created_at),
        updated_at: parse_time(&row.updated_at),
    }
}

pub fn settings(row: SettingsRow) -> SettingsResponse {
    SettingsResponse {
        friend_requests: row.friend_requests,
        messages: row.messages,
        coding_invites: row.coding_invites,
    }
}

pub fn friend_request(row: &FriendshipRow) -> FriendRequestResponse {
    FriendRequestResponse {
        id: parse_id(&row.id),
        user_id: parse_id(&row.user_id),
        friend_id: parse_id(&row.friend_id),
        status: parse_or(&row.status, FriendshipStatus::Pending),
        created_at: parse_time(&row.created_at),
    }
}

pub fn message(row: MessageRow, usernames: &HashMap<String, String>) -> MessageResponse {
    MessageResponse {
        id: parse_id(&row.id),
        sender_id: parse_id(&row.sender_id),
        receiver_id: parse_id(&row.receiver_id),
        sender_username: username_or_unknown(usernames, &row.sender_id),
        receiver_username: username_or_unknown(usernames, &row.receiver_id),
        content: row.content,
        read: row.read,
        created_at: parse_time(&row.created_at),
    }
}

pub fn notification(row: NotificationRow) -> NotificationResponse {
    NotificationResponse {
        id: parse_id(&row.id),
        kind: row.kind,
        title: row.title,
        message: row.message,
        read: row.read,
        created_at: parse_time(&row.created_at),
    }
}

pub fn session(row: SessionRow) -> SessionResponse {
    SessionResponse {
        id: parse_id(&row.id),
        host_id: parse_id(&row.host_id),
        language: language(&row.language),
        code: row.code,
        active: row.active,
        version: row.version,
        created_at: parse_time(&row.created_at),
        updated_at: parse_time(&row.updated_at),
    }
}

pub fn participant(row: ParticipantRow, usernames: &HashMap<String, String>) -> ParticipantResponse {
    ParticipantResponse {
        id: parse_id(&row.id),
        username: username_or_unknown(usernames, &row.user_id),
        user_id: parse_id(&row.user_id),
        joined_at: parse_time(&row.joined_at),
    }
}

pub fn challenge(row: ChallengeRow) -> ChallengeResponse {
    let test_cases = match row.test_cases.as_deref() {
        None => serde_json::Value::Null,
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!("Corrupt test_cases on challenge '{}': {}", row.id, e);
            serde_json::Value::Null
        }),
    };

    ChallengeResponse {
        id: parse_id(&row.id),
        title: row.title,
        description: row.description,
        difficulty: row.difficulty,
        points: row.points,
        problem_statement: row.problem_statement,
        test_cases,
    }
}

pub fn attempt(row: AttemptRow, participant_ids: &[String]) -> AttemptResponse {
    AttemptResponse {
        id: parse_id(&row.id),
        challenge_id: parse_id(&row.challenge_id),
        user_id: parse_id(&row.user_id),
        language: language(&row.language),
        code: row.code,
        status: parse_or(&row.status, AttemptStatus::InProgress),
        points_earned: row.points_earned,
        created_at: parse_time(&row.created_at),
        completed_at: row.completed_at.as_deref().map(parse_time),
        participant_ids: participant_ids.iter().map(|id| parse_id(id)).collect(),
    }
}
