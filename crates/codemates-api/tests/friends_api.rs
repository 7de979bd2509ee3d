//! Friend requests and the derived friend graph.

mod common;

use axum::http::StatusCode;
use common::{befriend, body_json, build_test_app, delete, get, post_empty, post_json, signup};
use serde_json::json;

#[tokio::test]
async fn accepted_friendship_shows_on_both_sides() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;
    befriend(&app, &alex, &sarah).await;

    let for_alex = body_json(get(&app, "/friends", &alex.token).await).await;
    let for_sarah = body_json(get(&app, "/friends", &sarah.token).await).await;

    assert_eq!(for_alex["friends"][0]["username"], "sarah_codes");
    assert_eq!(for_alex["friends"][0]["online"], false);
    assert_eq!(for_sarah["friends"][0]["username"], "alex_dev");
    assert_eq!(for_sarah["pending"].as_array().unwrap().len(), 0);

    // Accepting notified the sender
    let notifications = body_json(get(&app, "/notifications", &alex.token).await).await;
    assert_eq!(notifications[0]["type"], "friend_accepted");
}

#[tokio::test]
async fn request_validation_messages() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;

    let cases = [
        ("   ", StatusCode::BAD_REQUEST, "Please enter a username"),
        ("ghost_user", StatusCode::NOT_FOUND, "User not found"),
        ("alex_dev", StatusCode::BAD_REQUEST, "You cannot add yourself as a friend"),
    ];
    for (username, status, message) in cases {
        let response = post_json(&app, "/friends/requests", &alex.token, json!({ "username": username })).await;
        assert_eq!(response.status(), status);
        assert_eq!(body_json(response).await["error"], message);
    }

    let response = post_json(&app, "/friends/requests", &alex.token, json!({ "username": "sarah_codes" })).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // Same direction again
    let response = post_json(&app, "/friends/requests", &alex.token, json!({ "username": "sarah_codes" })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "Friend request already sent");

    // Reverse direction while pending
    let response = post_json(&app, "/friends/requests", &sarah.token, json!({ "username": "alex_dev" })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error"],
        "This user has already sent you a friend request"
    );

    // Still exactly one pending request
    let overview = body_json(get(&app, "/friends", &sarah.token).await).await;
    assert_eq!(overview["pending"].as_array().unwrap().len(), 1);
    assert_eq!(overview["pending"][0]["username"], "alex_dev");
}

#[tokio::test]
async fn already_friends_is_refused() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;
    befriend(&app, &alex, &sarah).await;

    let response = post_json(&app, "/friends/requests", &sarah.token, json!({ "username": "alex_dev" })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "You are already friends");
}

#[tokio::test]
async fn rejected_request_is_gone() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;

    let response = post_json(&app, "/friends/requests", &alex.token, json!({ "username": "sarah_codes" })).await;
    let request_id = body_json(response).await["id"].as_str().unwrap().to_string();

    // Only the recipient may respond
    let response = post_empty(&app, &format!("/friends/requests/{request_id}/reject"), &alex.token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_empty(&app, &format!("/friends/requests/{request_id}/reject"), &sarah.token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let overview = body_json(get(&app, "/friends", &sarah.token).await).await;
    assert!(overview["pending"].as_array().unwrap().is_empty());
    assert!(overview["friends"].as_array().unwrap().is_empty());

    // The pair can start over
    let response = post_json(&app, "/friends/requests", &alex.token, json!({ "username": "sarah_codes" })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn unfriending_removes_both_sides() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;
    befriend(&app, &alex, &sarah).await;

    let response = delete(&app, &format!("/friends/{}", alex.id), &sarah.token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    for user in [&alex, &sarah] {
        let overview = body_json(get(&app, "/friends", &user.token).await).await;
        assert!(overview["friends"].as_array().unwrap().is_empty());
    }

    let response = delete(&app, &format!("/friends/{}", alex.id), &sarah.token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
