use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use codemates_db::models::{AttemptRow, ScoreRow};
use codemates_types::api::{
    AttemptResponse, ChallengeResponse, CompleteAttemptRequest, LeaderboardEntry, StartAttemptRequest,
    UpdateAttemptCodeRequest,
};
use codemates_types::events::{ChangeKind, Table, TableChange};
use codemates_types::models::{AttemptStatus, NotificationKind};

use crate::convert::{self, parse_id, username_or_unknown};
use crate::error::{ApiError, ApiResult};
use crate::middleware::Claims;
use crate::realtime;
use crate::sessions::{FRIENDS_ONLY, normalize_collaborators};
use crate::state::AppState;

pub const LEADERBOARD_SIZE: usize = 10;

/// Total points per user over completed attempts, best first.
/// Ties go to the alphabetically first username, then the lower user id.
pub fn compute_leaderboard(
    scores: &[ScoreRow],
    usernames: &HashMap<String, String>,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut totals: HashMap<&str, i64> = HashMap::new();
    for score in scores {
        if score.status != AttemptStatus::Completed.as_str() {
            continue;
        }
        *totals.entry(score.user_id.as_str()).or_default() += score.points_earned.unwrap_or(0);
    }

    let mut ranked: Vec<(String, Uuid, i64)> = totals
        .into_iter()
        .map(|(id, points)| (username_or_unknown(usernames, id), parse_id(id), points))
        .collect();
    ranked.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)).then_with(|| a.1.cmp(&b.1)));

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (username, user_id, points))| LeaderboardEntry {
            rank: i + 1,
            user_id,
            username,
            points,
        })
        .collect()
}

pub async fn list_challenges(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ChallengeResponse>>> {
    let rows = state.run_db(|db| db.list_challenges()).await?;
    Ok(Json(rows.into_iter().map(convert::challenge).collect()))
}

pub async fn get_challenge(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(challenge_id): Path<Uuid>,
) -> ApiResult<Json<ChallengeResponse>> {
    let id = challenge_id.to_string();
    let row = state
        .run_db(move |db| db.get_challenge(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Challenge not found"))?;
    Ok(Json(convert::challenge(row)))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let (scores, usernames) = state
        .run_db(|db| {
            let scores = db.completed_scores()?;
            let mut ids: Vec<String> = scores.iter().map(|s| s.user_id.clone()).collect();
            ids.sort();
            ids.dedup();
            let usernames = db.get_usernames(&ids)?;
            Ok((scores, usernames))
        })
        .await?;

    Ok(Json(compute_leaderboard(&scores, &usernames, LEADERBOARD_SIZE)))
}

/// Start a solo attempt, or a group attempt when invitees are given.
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(challenge_id): Path<Uuid>,
    Json(req): Json<StartAttemptRequest>,
) -> ApiResult<impl IntoResponse> {
    let invitees = normalize_collaborators(claims.sub, &req.invitee_ids);
    let language = req.language.unwrap_or_default();
    let attempt_id = Uuid::new_v4();

    let participants: Vec<(String, String)> = invitees
        .iter()
        .map(|u| (Uuid::new_v4().to_string(), u.to_string()))
        .collect();

    let (challenge, row) = {
        let (cid, aid, me, participants) = (
            challenge_id.to_string(),
            attempt_id.to_string(),
            claims.sub.to_string(),
            participants.clone(),
        );
        state
            .run_db(move |db| {
                let Some(challenge) = db.get_challenge(&cid)? else {
                    return Ok(Err(ApiError::not_found("Challenge not found")));
                };
                let ids: Vec<String> = participants.iter().map(|(_, u)| u.clone()).collect();
                let known = db.get_usernames(&ids)?;
                if ids.iter().any(|id| !known.contains_key(id)) {
                    return Ok(Err(ApiError::not_found("User not found")));
                }
                for invitee in &ids {
                    if !db.are_friends(&me, invitee)? {
                        return Ok(Err(ApiError::forbidden(FRIENDS_ONLY)));
                    }
                }
                let row = db.create_attempt(&aid, &cid, &me, language.as_str(), language.starter_code(), &participants)?;
                Ok(Ok((challenge, row)))
            })
            .await??
    };

    let audience: Vec<Uuid> = std::iter::once(claims.sub).chain(invitees.iter().copied()).collect();
    for (participant_id, user_id) in &participants {
        realtime::publish(
            &state,
            TableChange::new(Table::ChallengeParticipants, ChangeKind::Insert, parse_id(participant_id))
                .column("attempt_id", attempt_id)
                .column("user_id", user_id)
                .audience(audience.iter().copied()),
        )
        .await;
    }

    if !invitees.is_empty() {
        let me = state.username_of(claims.sub).await?;
        for invitee in &invitees {
            realtime::notify(
                &state,
                *invitee,
                NotificationKind::ChallengeInvite,
                "Challenge Invite",
                &format!("{} invited you to solve {}", me, challenge.title),
            )
            .await;
        }
    }

    info!("Attempt {} on '{}' started with {} invitees", attempt_id, challenge.title, invitees.len());
    let ids: Vec<String> = participants.into_iter().map(|(_, u)| u).collect();
    Ok((StatusCode::CREATED, Json(convert::attempt(row, &ids))))
}

/// Attempts the caller owns or was invited to, oldest first.
pub async fn list_my_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<AttemptResponse>>> {
    let me = claims.sub.to_string();
    let attempts = state
        .run_db(move |db| {
            db.get_attempts_for_user(&me)?
                .into_iter()
                .map(|row| {
                    let participants = db.get_attempt_participants(&row.id)?;
                    Ok((row, participants))
                })
                .collect::<anyhow::Result<Vec<_>>>()
        })
        .await?;

    Ok(Json(
        attempts
            .into_iter()
            .map(|(row, participants)| convert::attempt(row, &participants))
            .collect(),
    ))
}

pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> ApiResult<Json<AttemptResponse>> {
    let (row, participants) = load_attempt(&state, attempt_id).await?;
    ensure_member(&row, &participants, claims.sub)?;
    Ok(Json(convert::attempt(row, &participants)))
}

pub async fn update_attempt_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<UpdateAttemptCodeRequest>,
) -> ApiResult<Json<AttemptResponse>> {
    let (row, participants) = load_attempt(&state, attempt_id).await?;
    ensure_member(&row, &participants, claims.sub)?;

    let id = row.id.clone();
    let updated = state
        .run_db(move |db| {
            if !db.update_attempt_code(&id, &req.code)? {
                return Ok(None);
            }
            db.get_attempt(&id)
        })
        .await?
        .ok_or_else(|| ApiError::conflict("Attempt is already completed"))?;

    Ok(Json(convert::attempt(updated, &participants)))
}

/// Grading hook. Points default to the challenge's value and never exceed it.
pub async fn complete_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    body: Option<Json<CompleteAttemptRequest>>,
) -> ApiResult<Json<AttemptResponse>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let (row, participants) = load_attempt(&state, attempt_id).await?;
    if row.user_id != claims.sub.to_string() {
        return Err(ApiError::forbidden("Only the attempt owner can complete it"));
    }
    if row.status == AttemptStatus::Completed.as_str() {
        return Err(ApiError::conflict("Attempt is already completed"));
    }

    let (id, cid) = (row.id.clone(), row.challenge_id.clone());
    let completed = state
        .run_db(move |db| {
            let max = db.get_challenge(&cid)?.map_or(0, |c| c.points);
            let points = req.points_earned.unwrap_or(max).clamp(0, max);
            db.complete_attempt(&id, points)
        })
        .await?
        .ok_or_else(|| ApiError::conflict("Attempt is already completed"))?;

    info!(
        "Attempt {} completed by {} for {} points",
        attempt_id,
        claims.sub,
        completed.points_earned.unwrap_or(0)
    );
    Ok(Json(convert::attempt(completed, &participants)))
}

async fn load_attempt(state: &AppState, attempt_id: Uuid) -> ApiResult<(AttemptRow, Vec<String>)> {
    let id = attempt_id.to_string();
    state
        .run_db(move |db| {
            let Some(row) = db.get_attempt(&id)? else {
                return Ok(None);
            };
            let participants = db.get_attempt_participants(&id)?;
            Ok(Some((row, participants)))
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Attempt not found"))
}

fn ensure_member(row: &AttemptRow, participants: &[String], user_id: Uuid) -> ApiResult<()> {
    let me = user_id.to_string();
    if row.user_id == me || participants.contains(&me) {
        Ok(())
    } else {
        Err(ApiError::forbidden("You are not part of this attempt"))
    }
}
