use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;

use codemates_gateway::connection;
use codemates_types::api::HealthResponse;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, challenges, friends, messages, notifications, profiles, sessions, strangers};

/// Every HTTP and WebSocket route. Transport layers (CORS, tracing) are
/// added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/gateway", get(ws_upgrade));

    let protected_routes = Router::new()
        .route("/auth/session", get(auth::session))
        // Profiles & settings
        .route("/profile", get(profiles::get_own_profile).put(profiles::update_profile))
        .route("/profiles/{user_id}", get(profiles::get_profile))
        .route("/settings", get(profiles::get_settings).put(profiles::update_settings))
        // Friends
        .route("/friends", get(friends::list_friends))
        .route("/friends/requests", post(friends::send_request))
        .route("/friends/requests/{request_id}/accept", post(friends::accept_request))
        .route("/friends/requests/{request_id}/reject", post(friends::reject_request))
        .route("/friends/{user_id}", delete(friends::remove_friend))
        // Messages
        .route("/messages", get(messages::list_messages).post(messages::send_message))
        .route("/messages/{message_id}/read", post(messages::mark_read))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{notification_id}/read", post(notifications::mark_read))
        // Coding sessions
        .route("/sessions", get(sessions::list_my_sessions).post(sessions::create_session))
        .route("/sessions/{session_id}", get(sessions::get_session))
        .route("/sessions/{session_id}/participants", get(sessions::list_participants))
        .route("/sessions/{session_id}/join", post(sessions::join_session))
        .route("/sessions/{session_id}/code", put(sessions::update_code))
        .route("/sessions/{session_id}/run", post(sessions::run_code))
        // Challenges
        .route("/challenges", get(challenges::list_challenges))
        .route("/challenges/leaderboard", get(challenges::leaderboard))
        .route("/challenges/{challenge_id}", get(challenges::get_challenge))
        .route("/challenges/{challenge_id}/attempts", post(challenges::start_attempt))
        .route("/attempts", get(challenges::list_my_attempts))
        .route("/attempts/{attempt_id}", get(challenges::get_attempt))
        .route("/attempts/{attempt_id}/code", put(challenges::update_attempt_code))
        .route("/attempts/{attempt_id}/complete", post(challenges::complete_attempt))
        // Code with strangers
        .route(
            "/strangers/requests",
            post(strangers::create_request)
                .get(strangers::request_status)
                .delete(strangers::cancel_request),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

/// The socket authenticates itself with `Identify` after the upgrade.
async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}
