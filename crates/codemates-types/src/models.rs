use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of a directional friendship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

impl FromStr for FriendshipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            other => Err(format!("unknown friendship status '{}'", other)),
        }
    }
}

/// Lifecycle of a challenge attempt. Abandoned attempts simply stay
/// `InProgress`; there is no terminal state written for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown attempt status '{}'", other)),
        }
    }
}

/// Editor languages offered in coding sessions and challenge attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Javascript,
    Python,
    C,
    Nodejs,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Javascript => "javascript",
            Self::Python => "python",
            Self::C => "c",
            Self::Nodejs => "nodejs",
        }
    }

    /// Template the editor is reset to when switching to this language.
    pub fn starter_code(&self) -> &'static str {
        match self {
            Self::Python => "# Python Code\nprint('Hello, World!')",
            Self::Javascript => "// JavaScript Code\nconsole.log('Hello, World!');",
            Self::C => {
                "#include <stdio.h>\n\nint main() {\n    printf(\"Hello, World!\\n\");\n    return 0;\n}"
            }
            Self::Nodejs => {
                "// Node.js Code\nconst message = 'Hello, World!';\nconsole.log(message);"
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "javascript" => Ok(Self::Javascript),
            "python" => Ok(Self::Python),
            "c" => Ok(Self::C),
            "nodejs" => Ok(Self::Nodejs),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

/// Notification categories. Each one is gated by a user setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FriendRequest,
    FriendAccepted,
    Message,
    CodingInvite,
    ChallengeInvite,
    CollabMatch,
}

/// The user-facing switch that controls a [`NotificationKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPreference {
    FriendRequests,
    Messages,
    CodingInvites,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FriendRequest => "friend_request",
            Self::FriendAccepted => "friend_accepted",
            Self::Message => "message",
            Self::CodingInvite => "coding_invite",
            Self::ChallengeInvite => "challenge_invite",
            Self::CollabMatch => "collab_match",
        }
    }

    pub fn preference(&self) -> NotificationPreference {
        match self {
            Self::FriendRequest | Self::FriendAccepted => NotificationPreference::FriendRequests,
            Self::Message => NotificationPreference::Messages,
            Self::CodingInvite | Self::ChallengeInvite | Self::CollabMatch => {
                NotificationPreference::CodingInvites
            }
        }
    }
}

impl NotificationPreference {
    /// Column in `notification_settings` holding this switch.
    pub fn column(&self) -> &'static str {
        match self {
            Self::FriendRequests => "friend_requests",
            Self::Messages => "messages",
            Self::CodingInvites => "coding_invites",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_parses_its_own_name() {
        for lang in [Language::Javascript, Language::Python, Language::C, Language::Nodejs] {
            assert_eq!(lang.as_str().parse::<Language>().unwrap(), lang);
        }
        assert!("rust".parse::<Language>().is_err());
    }

    #[test]
    fn invites_share_one_switch() {
        assert_eq!(
            NotificationKind::ChallengeInvite.preference(),
            NotificationKind::CodingInvite.preference()
        );
        assert_eq!(NotificationKind::FriendAccepted.preference().column(), "friend_requests");
    }
}
