//! Collaborative coding sessions.

mod common;

use axum::http::StatusCode;
use common::{TestUser, befriend, body_json, build_test_app, get, post_empty, post_json, put_json, signup};
use serde_json::json;

use codemates_types::models::Language;

/// Invites are friends-only, so the host befriends everyone first.
async fn create_session(app: &axum::Router, host: &TestUser, collaborators: &[&TestUser]) -> String {
    let mut befriended = Vec::new();
    for collaborator in collaborators {
        if !befriended.contains(&collaborator.id) {
            befriend(app, host, collaborator).await;
            befriended.push(collaborator.id);
        }
    }
    let ids: Vec<_> = collaborators.iter().map(|u| u.id).collect();
    let response = post_json(app, "/sessions", &host.token, json!({ "collaborator_ids": ids })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn empty_collaborator_list_is_refused() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;

    let response = post_json(&app, "/sessions", &alex.token, json!({ "collaborator_ids": [] })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Select at least one collaborator");

    // Only yourself counts as nobody
    let response = post_json(&app, "/sessions", &alex.token, json!({ "collaborator_ids": [alex.id] })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_collaborator_leaves_no_session() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;

    let response = post_json(
        &app,
        "/sessions",
        &alex.token,
        json!({ "collaborator_ids": [uuid::Uuid::new_v4()] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_json(get(&app, "/notifications", &alex.token).await).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn session_members_and_invites() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;
    let mike = signup(&app, "mike_js").await;

    let session_id = create_session(&app, &alex, &[&sarah, &mike, &sarah]).await;

    let session = body_json(get(&app, &format!("/sessions/{session_id}"), &sarah.token).await).await;
    assert_eq!(session["host_id"], alex.id.to_string());
    assert_eq!(session["language"], "javascript");
    assert_eq!(session["code"], "");
    assert_eq!(session["version"], 1);

    let members = body_json(get(&app, &format!("/sessions/{session_id}/participants"), &alex.token).await).await;
    let names: Vec<&str> = members.as_array().unwrap().iter().map(|m| m["username"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["alex_dev", "sarah_codes", "mike_js"]);

    let invites = body_json(get(&app, "/notifications", &mike.token).await).await;
    assert_eq!(invites[0]["type"], "coding_invite");
    let host_inbox = body_json(get(&app, "/notifications", &alex.token).await).await;
    assert!(host_inbox.as_array().unwrap().iter().all(|n| n["type"] != "coding_invite"));

    // Every member finds the session in their own list
    for user in [&alex, &sarah, &mike] {
        let mine = body_json(get(&app, "/sessions", &user.token).await).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
        assert_eq!(mine[0]["id"], session_id.as_str());
    }
}

#[tokio::test]
async fn only_friends_can_be_invited() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;
    let mike = signup(&app, "mike_js").await;
    befriend(&app, &alex, &sarah).await;

    // One stranger in the list spoils the whole invite
    let response = post_json(&app, "/sessions", &alex.token, json!({ "collaborator_ids": [sarah.id, mike.id] })).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "You can only invite friends");

    for user in [&alex, &sarah, &mike] {
        let mine = body_json(get(&app, "/sessions", &user.token).await).await;
        assert!(mine.as_array().unwrap().is_empty());
    }
    let inbox = body_json(get(&app, "/notifications", &mike.token).await).await;
    assert!(inbox.as_array().unwrap().is_empty());

    let response = post_json(&app, "/sessions", &alex.token, json!({ "collaborator_ids": [sarah.id] })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn code_updates_bump_version_and_detect_conflicts() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;
    let mike = signup(&app, "mike_js").await;
    let session_id = create_session(&app, &alex, &[&sarah]).await;
    let uri = format!("/sessions/{session_id}/code");

    let response = put_json(&app, &uri, &sarah.token, json!({ "code": "let a = 1;", "base_version": 1 })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["version"], 2);

    // Alex still holds version 1
    let response = put_json(&app, &uri, &alex.token, json!({ "code": "let b = 2;", "base_version": 1 })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["session"]["code"], "let a = 1;");
    assert_eq!(json["session"]["version"], 2);

    // Without a version stamp the last write wins
    let response = put_json(&app, &uri, &alex.token, json!({ "code": "let b = 2;" })).await;
    assert_eq!(body_json(response).await["code"], "let b = 2;");

    // Non-members cannot write
    let response = put_json(&app, &uri, &mike.token, json!({ "code": "rm -rf" })).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Joining grants access
    let response = post_empty(&app, &format!("/sessions/{session_id}/join"), &mike.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    post_empty(&app, &format!("/sessions/{session_id}/join"), &mike.token).await;
    let members = body_json(get(&app, &format!("/sessions/{session_id}/participants"), &alex.token).await).await;
    assert_eq!(members.as_array().unwrap().len(), 3);

    let response = put_json(&app, &uri, &mike.token, json!({ "language": "python" })).await;
    let json = body_json(response).await;
    assert_eq!(json["language"], "python");
    assert_eq!(json["code"], Language::Python.starter_code());
}

#[tokio::test]
async fn run_is_a_placeholder() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;
    let session_id = create_session(&app, &alex, &[&sarah]).await;

    let json = body_json(post_empty(&app, &format!("/sessions/{session_id}/run"), &alex.token).await).await;
    assert_eq!(json["executed"], false);
    assert_eq!(json["output"], "Code execution will be available in the next update.");

    let response = get(&app, &format!("/sessions/{}", uuid::Uuid::new_v4()), &alex.token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Session not found");
}
