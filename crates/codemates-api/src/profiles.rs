use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use codemates_types::api::{ProfileResponse, SettingsResponse, UpdateProfileRequest, UpdateSettingsRequest};

use crate::auth::validate_username;
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Claims;
use crate::state::AppState;

pub async fn get_own_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ProfileResponse>> {
    load_profile(&state, claims.sub).await
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ProfileResponse>> {
    load_profile(&state, user_id).await
}

async fn load_profile(state: &AppState, user_id: Uuid) -> ApiResult<Json<ProfileResponse>> {
    let id = user_id.to_string();
    let row = state
        .run_db(move |db| db.get_profile(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;
    Ok(Json(convert::profile(row)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let username = req.username.map(|u| u.trim().to_string());
    if let Some(username) = &username {
        validate_username(username)?;
    }
    let bio = req.bio.map(|b| b.trim().to_string());
    let avatar_url = req.avatar_url.map(|a| a.trim().to_string());

    let id = claims.sub.to_string();
    let row = state
        .run_db(move |db| {
            db.update_profile(&id, username.as_deref(), bio.as_deref(), avatar_url.as_deref())
        })
        .await
        .map_err(|e| e.on_unique_violation("Username already taken"))?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(Json(convert::profile(row)))
}

pub async fn get_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SettingsResponse>> {
    let id = claims.sub.to_string();
    let row = state.run_db(move |db| db.get_settings(&id)).await?;
    Ok(Json(convert::settings(row)))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<SettingsResponse>> {
    let id = claims.sub.to_string();
    let row = state.run_db(move |db| db.update_settings(&id, &req)).await?;
    Ok(Json(convert::settings(row)))
}
