use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use codemates_types::api::{AuthResponse, IdentityResponse, LoginRequest, SignupRequest};

use crate::convert::parse_id;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Claims;
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid login credentials";

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let username = req.username.trim().to_string();

    if !email.contains('@') {
        return Err(ApiError::bad_request("Please enter a valid email address"));
    }
    validate_username(&username)?;
    if req.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let (email_taken, username_taken) = {
        let (email, username) = (email.clone(), username.clone());
        state
            .run_db(move |db| {
                Ok((
                    db.get_user_by_email(&email)?.is_some(),
                    db.get_profile_by_username(&username)?.is_some(),
                ))
            })
            .await?
    };
    if email_taken {
        return Err(ApiError::conflict("Email already registered"));
    }
    if username_taken {
        return Err(ApiError::conflict("Username already taken"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    {
        let (id, email, username) = (user_id.to_string(), email.clone(), username.clone());
        state
            .run_db(move |db| db.create_account(&id, &email, &username, &password_hash))
            .await
            // Lost a race with a concurrent signup
            .map_err(|e| e.on_unique_violation("Email or username already taken"))?;
    }

    let token = create_token(&state.jwt_secret, state.token_ttl, user_id, &username)?;
    info!("User '{}' signed up", username);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            username,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();
    let (user, profile) = state
        .run_db(move |db| {
            let Some(user) = db.get_user_by_email(&email)? else {
                return Ok(None);
            };
            let profile = db.get_profile(&user.id)?;
            Ok(Some((user, profile)))
        })
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| anyhow::anyhow!("stored hash for {} is unreadable: {}", user.id, e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    let profile = profile.ok_or_else(|| ApiError::not_found("Profile not found"))?;
    let user_id = parse_id(&user.id);
    let token = create_token(&state.jwt_secret, state.token_ttl, user_id, &profile.username)?;

    Ok(Json(AuthResponse {
        user_id,
        username: profile.username,
        token,
    }))
}

/// The identity behind the presented token.
pub async fn session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<IdentityResponse>> {
    let id = claims.sub.to_string();
    let (user, profile) = state
        .run_db(move |db| Ok((db.get_user_by_id(&id)?, db.get_profile(&id)?)))
        .await?;

    let user = user.ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;
    let profile = profile.ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(Json(IdentityResponse {
        user_id: claims.sub,
        username: profile.username,
        email: user.email,
    }))
}

pub fn validate_username(username: &str) -> ApiResult<()> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ApiError::bad_request("Username must be between 3 and 32 characters"));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ApiError::bad_request(
            "Username may only contain letters, numbers and underscores",
        ));
    }
    Ok(())
}

pub fn create_token(
    secret: &str,
    ttl: chrono::Duration,
    user_id: Uuid,
    username: &str,
) -> anyhow::Result<String> {
    let expires = chrono::Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| anyhow::anyhow!("token lifetime of {} days is out of range", ttl.num_days()))?;
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: usize::try_from(expires.timestamp())?,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
