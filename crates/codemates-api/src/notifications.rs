use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use codemates_types::api::NotificationResponse;
use codemates_types::events::{ChangeKind, Table, TableChange};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Claims;
use crate::realtime;
use crate::state::AppState;

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    let me = claims.sub.to_string();
    let rows = state.run_db(move |db| db.get_notifications(&me)).await?;
    Ok(Json(rows.into_iter().map(convert::notification).collect()))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (id, me) = (notification_id.to_string(), claims.sub.to_string());
    if !state.run_db(move |db| db.mark_notification_read(&id, &me)).await? {
        return Err(ApiError::not_found("Notification not found"));
    }

    realtime::publish(&state, read_change(claims.sub, notification_id)).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let me = claims.sub.to_string();
    let ids = state.run_db(move |db| db.mark_all_notifications_read(&me)).await?;

    for id in &ids {
        realtime::publish(&state, read_change(claims.sub, convert::parse_id(id))).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

fn read_change(owner: Uuid, notification_id: Uuid) -> TableChange {
    TableChange::new(Table::Notifications, ChangeKind::Update, notification_id)
        .column("user_id", owner)
        .audience([owner])
}
