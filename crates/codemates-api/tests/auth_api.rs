//! Signup, login, identity and the HTTP shell.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, build_test_app, get, put_json, send, signup};
use serde_json::json;

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = build_test_app();
    let response = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (app, _) = build_test_app();
    let response = send(&app, Method::GET, "/does-not-exist", None, None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Not found");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let (app, _) = build_test_app();
    let response = send(&app, Method::GET, "/friends", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get(&app, "/friends", "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_then_login_and_session() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;

    let body = json!({ "email": "ALEX_DEV@example.com", "password": "correct-horse-battery" });
    let response = send(&app, Method::POST, "/auth/login", None, Some(body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["username"], "alex_dev");
    assert_eq!(json["user_id"], alex.id.to_string());

    let response = get(&app, "/auth/session", &alex.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "alex_dev@example.com");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let (app, _) = build_test_app();
    signup(&app, "alex_dev").await;

    let body = json!({ "email": "alex_dev@example.com", "password": "wrong-password" });
    let response = send(&app, Method::POST, "/auth/login", None, Some(body)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid login credentials");
}

#[tokio::test]
async fn signup_validation_and_conflicts() {
    let (app, _) = build_test_app();
    signup(&app, "alex_dev").await;

    let cases = [
        (json!({ "email": "nope", "username": "new_user", "password": "long-enough" }), StatusCode::BAD_REQUEST),
        (json!({ "email": "a@b.c", "username": "x", "password": "long-enough" }), StatusCode::BAD_REQUEST),
        (json!({ "email": "a@b.c", "username": "new_user", "password": "short" }), StatusCode::BAD_REQUEST),
        (json!({ "email": "a@b.c", "username": "alex_dev", "password": "long-enough" }), StatusCode::CONFLICT),
        (
            json!({ "email": "alex_dev@example.com", "username": "other", "password": "long-enough" }),
            StatusCode::CONFLICT,
        ),
    ];
    for (body, expected) in cases {
        let response = send(&app, Method::POST, "/auth/signup", None, Some(body.clone())).await;
        assert_eq!(response.status(), expected, "signup with {body}");
    }
}

#[tokio::test]
async fn profile_and_settings_round_trip() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    signup(&app, "sarah_codes").await;

    let response = put_json(&app, "/profile", &alex.token, json!({ "bio": "Rustacean" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["bio"], "Rustacean");
    assert_eq!(json["username"], "alex_dev");

    let response = put_json(&app, "/profile", &alex.token, json!({ "username": "sarah_codes" })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "Username already taken");

    let response = get(&app, &format!("/profiles/{}", uuid::Uuid::new_v4()), &alex.token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Profile not found");

    let response = put_json(&app, "/settings", &alex.token, json!({ "messages": false })).await;
    let json = body_json(response).await;
    assert_eq!(json["messages"], false);
    assert_eq!(json["friend_requests"], true);
}
