use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use codemates_db::CodeUpdate;
use codemates_types::api::{
    CreateSessionRequest, CreateSessionResponse, ParticipantResponse, RunResponse, SessionResponse, UpdateCodeRequest,
};
use codemates_types::events::{ChangeKind, Table, TableChange};
use codemates_types::models::{Language, NotificationKind};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Claims;
use crate::realtime;
use crate::state::AppState;

const RUN_PLACEHOLDER: &str = "Code execution will be available in the next update.";
pub(crate) const FRIENDS_ONLY: &str = "You can only invite friends";

/// Who a host may pull into a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Invitations {
    FriendsOnly,
    /// Matchmaking pairs users who have never met.
    Anyone,
}

/// Collaborators minus the host, first occurrence wins.
pub fn normalize_collaborators(host: Uuid, collaborator_ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    collaborator_ids
        .iter()
        .copied()
        .filter(|id| *id != host && seen.insert(*id))
        .collect()
}

/// A freshly created session and everyone in it, host first.
pub struct StartedSession {
    pub session: SessionResponse,
    pub members: Vec<Uuid>,
}

/// Create a session with its host and collaborators as members, in one
/// transaction, and announce it to everyone involved.
pub(crate) async fn start_session(
    state: &AppState,
    host: Uuid,
    collaborator_ids: &[Uuid],
    language: Language,
    code: String,
    access: Invitations,
) -> ApiResult<StartedSession> {
    let collaborators = normalize_collaborators(host, collaborator_ids);
    if collaborators.is_empty() {
        return Err(ApiError::bad_request("Select at least one collaborator"));
    }

    let session_id = Uuid::new_v4();
    let members: Vec<Uuid> = std::iter::once(host).chain(collaborators.iter().copied()).collect();
    let rows: Vec<(String, String)> = members
        .iter()
        .map(|m| (Uuid::new_v4().to_string(), m.to_string()))
        .collect();

    let session = {
        let (id, host_id, member_ids) = (session_id.to_string(), host.to_string(), members.clone());
        state
            .run_db(move |db| {
                let ids: Vec<String> = member_ids.iter().map(Uuid::to_string).collect();
                let known = db.get_usernames(&ids)?;
                if ids.iter().any(|id| !known.contains_key(id)) {
                    return Ok(Err(ApiError::not_found("User not found")));
                }
                if access == Invitations::FriendsOnly {
                    for other in ids.iter().filter(|id| **id != host_id) {
                        if !db.are_friends(&host_id, other)? {
                            return Ok(Err(ApiError::forbidden(FRIENDS_ONLY)));
                        }
                    }
                }
                let row = db.create_session(&id, &host_id, language.as_str(), &code, &rows)?;
                Ok(Ok((row, rows)))
            })
            .await??
    };
    let (row, membership) = session;

    realtime::publish(
        state,
        TableChange::new(Table::CodingSessions, ChangeKind::Insert, session_id)
            .column("host_id", host)
            .audience(members.iter().copied()),
    )
    .await;
    for (participant_id, user_id) in &membership {
        realtime::publish(
            state,
            participant_change(ChangeKind::Insert, convert::parse_id(participant_id), session_id, convert::parse_id(user_id))
                .audience(members.iter().copied()),
        )
        .await;
    }

    info!("Session {} started by {} with {} collaborators", session_id, host, collaborators.len());
    Ok(StartedSession {
        session: convert::session(row),
        members,
    })
}

pub async fn create_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    // Refuse before touching storage
    if req.collaborator_ids.is_empty() {
        return Err(ApiError::bad_request("Select at least one collaborator"));
    }

    let language = req.language.unwrap_or_default();
    let code = req.code.unwrap_or_default();
    let started = start_session(
        &state,
        claims.sub,
        &req.collaborator_ids,
        language,
        code,
        Invitations::FriendsOnly,
    )
    .await?;

    let host = state.username_of(claims.sub).await?;
    for member in started.members.iter().skip(1) {
        realtime::notify(
            &state,
            *member,
            NotificationKind::CodingInvite,
            "Coding Session Invite",
            &format!("{} invited you to a coding session", host),
        )
        .await;
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: started.session.id,
        }),
    ))
}

/// Sessions the caller is a member of, including ones they were invited to.
pub async fn list_my_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let me = claims.sub.to_string();
    let rows = state.run_db(move |db| db.get_sessions_for_user(&me)).await?;
    Ok(Json(rows.into_iter().map(convert::session).collect()))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    let id = session_id.to_string();
    let row = state
        .run_db(move |db| db.get_session(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;
    Ok(Json(convert::session(row)))
}

/// Members in join order, with usernames resolved in one lookup.
pub async fn list_participants(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ParticipantResponse>>> {
    let id = session_id.to_string();
    let (rows, usernames) = state
        .run_db(move |db| {
            if db.get_session(&id)?.is_none() {
                return Ok(None);
            }
            let rows = db.get_session_participants(&id)?;
            let ids: Vec<String> = rows.iter().map(|p| p.user_id.clone()).collect();
            let usernames = db.get_usernames(&ids)?;
            Ok(Some((rows, usernames)))
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    Ok(Json(
        rows.into_iter()
            .map(|row| convert::participant(row, &usernames))
            .collect(),
    ))
}

/// Join an existing session. Joining twice is a no-op.
pub async fn join_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    let participant_id = Uuid::new_v4();
    let (id, pid, me) = (session_id.to_string(), participant_id.to_string(), claims.sub.to_string());
    let (row, added) = state
        .run_db(move |db| {
            let Some(row) = db.get_session(&id)? else {
                return Ok(None);
            };
            let added = db.add_session_participant(&pid, &id, &me)?;
            Ok(Some((row, added)))
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if added {
        let audience = realtime::session_audience(&state, session_id).await;
        realtime::publish(
            &state,
            participant_change(ChangeKind::Insert, participant_id, session_id, claims.sub).audience(audience),
        )
        .await;
    }

    Ok(Json(convert::session(row)))
}

/// What a code update writes, given the current session state.
/// Switching language without sending code resets to the new starter template.
pub fn resolve_code_update(
    current_code: &str,
    current_language: Language,
    req: &UpdateCodeRequest,
) -> Option<(String, Language)> {
    let language = req.language.unwrap_or(current_language);
    let code = match (&req.code, req.language) {
        (Some(code), _) => code.clone(),
        (None, Some(lang)) if lang != current_language => lang.starter_code().to_string(),
        (None, Some(_)) => current_code.to_string(),
        (None, None) => return None,
    };
    Some((code, language))
}

pub async fn update_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<UpdateCodeRequest>,
) -> ApiResult<Response> {
    let current = load_session_as_participant(&state, session_id, claims.sub).await?;

    let (code, language) = resolve_code_update(&current.code, current.language, &req)
        .ok_or_else(|| ApiError::bad_request("Nothing to update"))?;

    let id = session_id.to_string();
    let base_version = req.base_version;
    let outcome = state
        .run_db(move |db| db.update_session_code(&id, &code, language.as_str(), base_version))
        .await?;

    match outcome {
        CodeUpdate::Applied(row) => {
            let session = convert::session(row);
            let audience = realtime::session_audience(&state, session_id).await;
            realtime::publish(
                &state,
                TableChange::new(Table::CodingSessions, ChangeKind::Update, session_id)
                    .column("host_id", session.host_id)
                    .audience(audience),
            )
            .await;
            Ok(Json(session).into_response())
        }
        CodeUpdate::VersionMismatch(row) => Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Session was changed by another participant",
                "session": convert::session(row),
            })),
        )
            .into_response()),
        CodeUpdate::NotFound => Err(ApiError::not_found("Session not found")),
    }
}

/// Placeholder until an execution backend exists.
pub async fn run_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<RunResponse>> {
    load_session_as_participant(&state, session_id, claims.sub).await?;
    Ok(Json(RunResponse {
        executed: false,
        output: RUN_PLACEHOLDER.to_string(),
    }))
}

async fn load_session_as_participant(state: &AppState, session_id: Uuid, user_id: Uuid) -> ApiResult<SessionResponse> {
    let (id, uid) = (session_id.to_string(), user_id.to_string());
    let (row, member) = state
        .run_db(move |db| {
            let Some(row) = db.get_session(&id)? else {
                return Ok(None);
            };
            Ok(Some((row, db.is_session_participant(&id, &uid)?)))
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if !member {
        return Err(ApiError::forbidden("Only session participants can do that"));
    }
    Ok(convert::session(row))
}

fn participant_change(kind: ChangeKind, participant_id: Uuid, session_id: Uuid, user_id: Uuid) -> TableChange {
    TableChange::new(Table::SessionParticipants, kind, participant_id)
        .column("session_id", session_id)
        .column("user_id", user_id)
}
