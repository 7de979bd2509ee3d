use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use codemates_types::api::{MessageResponse, SendMessageRequest};
use codemates_types::events::{ChangeKind, Table, TableChange};
use codemates_types::models::NotificationKind;

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Claims;
use crate::realtime;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    /// Restrict the conversation to one counterpart.
    pub with: Option<Uuid>,
}

/// Every message the caller sent or received, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<MessageQuery>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let me = claims.sub.to_string();
    let counterpart = query.with.map(|id| id.to_string());

    let (rows, usernames) = state
        .run_db(move |db| {
            let rows = db.get_messages_for_user(&me, counterpart.as_deref())?;
            let mut ids: Vec<String> = rows
                .iter()
                .flat_map(|m| [m.sender_id.clone(), m.receiver_id.clone()])
                .collect();
            ids.sort();
            ids.dedup();
            let usernames = db.get_usernames(&ids)?;
            Ok((rows, usernames))
        })
        .await?;

    Ok(Json(
        rows.into_iter()
            .map(|row| convert::message(row, &usernames))
            .collect(),
    ))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }

    let receiver = req.receiver_id;
    let (id, me, to) = (Uuid::new_v4().to_string(), claims.sub.to_string(), receiver.to_string());
    let (row, usernames) = state
        .run_db(move |db| {
            let names = db.get_usernames(&[me.clone(), to.clone()])?;
            if !names.contains_key(&to) {
                return Ok(None);
            }
            let row = db.insert_message(&id, &me, &to, &content)?;
            Ok(Some((row, names)))
        })
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let message = convert::message(row, &usernames);
    realtime::publish(
        &state,
        TableChange::new(Table::Messages, ChangeKind::Insert, message.id)
            .column("sender_id", message.sender_id)
            .column("receiver_id", message.receiver_id)
            .audience([message.sender_id, message.receiver_id]),
    )
    .await;
    realtime::notify(
        &state,
        receiver,
        NotificationKind::Message,
        "New Message",
        &format!("{} sent you a message", message.sender_username),
    )
    .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Only the receiver can mark a message read.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (id, me) = (message_id.to_string(), claims.sub.to_string());
    let row = state
        .run_db(move |db| {
            if !db.mark_message_read(&id, &me)? {
                return Ok(None);
            }
            db.get_message(&id)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;

    let (sender, receiver) = (convert::parse_id(&row.sender_id), convert::parse_id(&row.receiver_id));
    realtime::publish(
        &state,
        TableChange::new(Table::Messages, ChangeKind::Update, message_id)
            .column("sender_id", sender)
            .column("receiver_id", receiver)
            .audience([sender, receiver]),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
