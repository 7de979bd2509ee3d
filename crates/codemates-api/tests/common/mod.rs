#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use codemates_api::{AppState, AppStateInner, router};
use codemates_db::Database;

pub const TEST_SECRET: &str = "test-secret";

/// Fresh in-memory database behind the full router.
pub fn build_test_app() -> (Router, AppState) {
    let db = Database::open_in_memory().expect("in-memory database");
    let state = AppStateInner::new(db, TEST_SECRET.to_string(), chrono::Duration::days(1));
    (router(state.clone()), state)
}

pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub token: String,
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: &Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn post_empty(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn delete(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Sign up through the API and return the new identity.
pub async fn signup(app: &Router, username: &str) -> TestUser {
    let body = json!({
        "email": format!("{username}@example.com"),
        "username": username,
        "password": "correct-horse-battery",
    });
    let response = send(app, Method::POST, "/auth/signup", None, Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;

    TestUser {
        id: json["user_id"].as_str().unwrap().parse().unwrap(),
        username: username.to_string(),
        token: json["token"].as_str().unwrap().to_string(),
    }
}

/// Send a friend request from `a` to `b` and accept it.
pub async fn befriend(app: &Router, a: &TestUser, b: &TestUser) {
    let response = post_json(app, "/friends/requests", &a.token, json!({ "username": b.username })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let request_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = post_empty(app, &format!("/friends/requests/{request_id}/accept"), &b.token).await;
    assert_eq!(response.status(), StatusCode::OK);
}
