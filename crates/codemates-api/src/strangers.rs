//! "Code with strangers": pair two users who each posted a collaboration request.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};

use codemates_types::api::{CollabRequestCreate, MatchResponse, MatchStatus};
use codemates_types::models::{Language, NotificationKind};

use crate::error::{ApiError, ApiResult};
use crate::matchmaking::{CollabRequest, Pairing};
use crate::middleware::Claims;
use crate::realtime;
use crate::sessions::{Invitations, start_session};
use crate::state::AppState;

pub async fn create_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CollabRequestCreate>,
) -> ApiResult<impl IntoResponse> {
    let title = req.title.trim().to_string();
    let description = req.description.trim().to_string();
    if title.is_empty() || description.is_empty() {
        return Err(ApiError::bad_request("Please fill in both title and description"));
    }

    let request = CollabRequest::new(claims.sub, title, description);
    let partner = match state.matchmaker.enqueue_or_match(request).await {
        Pairing::Queued => {
            return Ok((
                StatusCode::ACCEPTED,
                Json(MatchResponse {
                    status: MatchStatus::Waiting,
                    session_id: None,
                }),
            ));
        }
        Pairing::Matched(partner) => partner,
    };

    // The partner waited longest, so they host
    let started = match start_session(
        &state,
        partner.user_id,
        &[claims.sub],
        Language::default(),
        String::new(),
        Invitations::Anyone,
    )
    .await
    {
        Ok(started) => started,
        Err(e) => {
            warn!("Pairing {} with {} failed: {}", claims.sub, partner.user_id, e);
            state.matchmaker.requeue_front(partner).await;
            return Err(e);
        }
    };

    state
        .matchmaker
        .record_match(partner.user_id, claims.sub, started.session.id)
        .await;

    let message = format!("You've been matched for \"{}\": {}", partner.title, partner.description);
    for user in [partner.user_id, claims.sub] {
        realtime::notify(&state, user, NotificationKind::CollabMatch, "Match Found!", &message).await;
    }
    info!(
        "Matched {} with {} in session {} after {}s in queue",
        claims.sub,
        partner.user_id,
        started.session.id,
        (Utc::now() - partner.queued_at).num_seconds()
    );

    Ok((
        StatusCode::OK,
        Json(MatchResponse {
            status: MatchStatus::Matched,
            session_id: Some(started.session.id),
        }),
    ))
}

pub async fn request_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Json<MatchResponse> {
    if state.matchmaker.is_waiting(claims.sub).await {
        return Json(MatchResponse {
            status: MatchStatus::Waiting,
            session_id: None,
        });
    }
    // A host paired while away learns the session here
    match state.matchmaker.last_match(claims.sub).await {
        Some(session_id) => Json(MatchResponse {
            status: MatchStatus::Matched,
            session_id: Some(session_id),
        }),
        None => Json(MatchResponse {
            status: MatchStatus::Idle,
            session_id: None,
        }),
    }
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> StatusCode {
    state.matchmaker.cancel(claims.sub).await;
    StatusCode::NO_CONTENT
}
