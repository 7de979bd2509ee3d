//! In-memory queue for "code with strangers" pairing.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CollabRequest {
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub queued_at: DateTime<Utc>,
}

impl CollabRequest {
    pub fn new(user_id: Uuid, title: String, description: String) -> Self {
        Self {
            user_id,
            title,
            description,
            queued_at: Utc::now(),
        }
    }
}

/// Outcome of [`Matchmaker::enqueue_or_match`].
#[derive(Debug)]
pub enum Pairing {
    /// Paired with the longest-waiting other user, who has left the queue.
    Matched(CollabRequest),
    Queued,
}

#[derive(Default)]
struct Queue {
    waiting: VecDeque<CollabRequest>,
    /// Most recent session each user was paired into.
    matches: HashMap<Uuid, Uuid>,
}

#[derive(Default)]
pub struct Matchmaker {
    inner: Mutex<Queue>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `request` with the head of the queue, or queue it. A user's older
    /// request is always replaced, never matched against itself.
    pub async fn enqueue_or_match(&self, request: CollabRequest) -> Pairing {
        let mut inner = self.inner.lock().await;
        inner.matches.remove(&request.user_id);
        inner.waiting.retain(|r| r.user_id != request.user_id);

        match inner.waiting.pop_front() {
            Some(partner) => Pairing::Matched(partner),
            None => {
                inner.waiting.push_back(request);
                Pairing::Queued
            }
        }
    }

    /// Put a partner back at the head after a failed pairing.
    pub async fn requeue_front(&self, request: CollabRequest) {
        let mut inner = self.inner.lock().await;
        inner.waiting.retain(|r| r.user_id != request.user_id);
        inner.waiting.push_front(request);
    }

    /// Remember the session both users were paired into.
    pub async fn record_match(&self, a: Uuid, b: Uuid, session_id: Uuid) {
        let mut inner = self.inner.lock().await;
        inner.matches.insert(a, session_id);
        inner.matches.insert(b, session_id);
    }

    pub async fn last_match(&self, user_id: Uuid) -> Option<Uuid> {
        self.inner.lock().await.matches.get(&user_id).copied()
    }

    /// Returns true if the user had a queued request. Also forgets their
    /// last match.
    pub async fn cancel(&self, user_id: Uuid) -> bool {
        let mut inner = self.inner.lock().await;
        inner.matches.remove(&user_id);
        let before = inner.waiting.len();
        inner.waiting.retain(|r| r.user_id != user_id);
        inner.waiting.len() != before
    }

    pub async fn is_waiting(&self, user_id: Uuid) -> bool {
        self.inner.lock().await.waiting.iter().any(|r| r.user_id == user_id)
    }
}
