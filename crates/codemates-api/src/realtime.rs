//! Change publication and notification fan-out.
//!
//! Handlers call these after their write has committed. Nothing here can fail
//! the request that triggered it: delivery problems are logged and dropped.

use tracing::{debug, warn};
use uuid::Uuid;

use codemates_types::events::{ChangeKind, Table, TableChange};
use codemates_types::models::NotificationKind;

use crate::convert::parse_id;
use crate::state::AppState;

pub async fn publish(state: &AppState, change: TableChange) {
    state.dispatcher.publish(change).await;
}

/// Current members of a session, as the audience for changes on its rows.
pub async fn session_audience(state: &AppState, session_id: Uuid) -> Vec<Uuid> {
    let sid = session_id.to_string();
    match state.run_db(move |db| db.get_session_participants(&sid)).await {
        Ok(rows) => rows.iter().map(|p| parse_id(&p.user_id)).collect(),
        Err(e) => {
            warn!("Could not load audience for session {}: {}", session_id, e);
            Vec::new()
        }
    }
}

/// Store a notification for `user_id` (subject to their settings) and tell
/// their open connections about it.
pub async fn notify(state: &AppState, user_id: Uuid, kind: NotificationKind, title: &str, message: &str) {
    let id = Uuid::new_v4();
    let (nid, uid, title, message) = (id.to_string(), user_id.to_string(), title.to_string(), message.to_string());

    match state
        .run_db(move |db| db.create_notification(&nid, &uid, kind, &title, &message))
        .await
    {
        Ok(Some(_)) => {
            publish(
                state,
                TableChange::new(Table::Notifications, ChangeKind::Insert, id)
                    .column("user_id", user_id)
                    .audience([user_id]),
            )
            .await;
        }
        Ok(None) => debug!("{} notification for {} suppressed by settings", kind.as_str(), user_id),
        Err(e) => warn!("Failed to create {} notification for {}: {}", kind.as_str(), user_id, e),
    }
}
