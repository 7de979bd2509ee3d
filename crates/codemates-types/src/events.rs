use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tables a client may watch over the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Friendships,
    Messages,
    Notifications,
    CodingSessions,
    SessionParticipants,
    ChallengeParticipants,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Friendships => "friendships",
            Self::Messages => "messages",
            Self::Notifications => "notifications",
            Self::CodingSessions => "coding_sessions",
            Self::SessionParticipants => "session_participants",
            Self::ChallengeParticipants => "challenge_participants",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Equality predicate on a column of the changed row, e.g. `session_id = <id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

/// A committed row change, published by the API after every write.
///
/// `columns` holds the foreign-key columns clients may filter on.
/// `audience` is the set of users allowed to learn about the change; the
/// dispatcher never delivers it to anyone else.
#[derive(Debug, Clone)]
pub struct TableChange {
    pub table: Table,
    pub kind: ChangeKind,
    pub row_id: Uuid,
    pub columns: BTreeMap<String, String>,
    pub audience: Vec<Uuid>,
}

impl TableChange {
    pub fn new(table: Table, kind: ChangeKind, row_id: Uuid) -> Self {
        Self {
            table,
            kind,
            row_id,
            columns: BTreeMap::new(),
            audience: Vec::new(),
        }
    }

    pub fn column(mut self, name: &str, value: impl ToString) -> Self {
        self.columns.insert(name.to_string(), value.to_string());
        self
    }

    pub fn audience(mut self, users: impl IntoIterator<Item = Uuid>) -> Self {
        for user in users {
            if !self.audience.contains(&user) {
                self.audience.push(user);
            }
        }
        self
    }

    /// True when `filter` is absent or the named column holds the given value.
    pub fn matches(&self, filter: Option<&RowFilter>) -> bool {
        match filter {
            None => true,
            Some(f) if f.column == "id" => self.row_id.to_string() == f.value,
            Some(f) => self.columns.get(&f.column).is_some_and(|v| *v == f.value),
        }
    }
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A subscription was registered
    Subscribed { subscription_id: String, table: Table },

    /// A watched table changed; the client should refetch the dependent view
    Change {
        subscription_id: String,
        table: Table,
        kind: ChangeKind,
        row_id: Uuid,
    },

    /// A user came online or went offline
    PresenceUpdate {
        user_id: Uuid,
        username: String,
        online: bool,
    },

    /// A command could not be honoured
    Error { message: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Watch a table, optionally restricted to rows matching `filter`.
    /// Re-using a `subscription_id` replaces the earlier subscription.
    Subscribe {
        subscription_id: String,
        table: Table,
        #[serde(default)]
        filter: Option<RowFilter>,
    },

    /// Stop watching
    Unsubscribe { subscription_id: String },
}
