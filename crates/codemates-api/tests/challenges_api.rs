//! Challenge catalog, attempts and the leaderboard.

mod common;

use axum::http::StatusCode;
use common::{befriend, body_json, build_test_app, get, post_json, put_json, send, signup};
use serde_json::json;

const TWO_SUM: &str = "00000000-0000-0000-0000-00000000c001";
const KNAPSACK: &str = "00000000-0000-0000-0000-00000000c003";

#[tokio::test]
async fn catalog_is_seeded() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;

    let challenges = body_json(get(&app, "/challenges", &alex.token).await).await;
    assert_eq!(challenges.as_array().unwrap().len(), 4);

    let two_sum = body_json(get(&app, &format!("/challenges/{TWO_SUM}"), &alex.token).await).await;
    assert_eq!(two_sum["title"], "Two Sum Problem");
    assert_eq!(two_sum["points"], 100);
    assert!(two_sum["test_cases"].is_array());
}

#[tokio::test]
async fn group_attempt_and_scoring() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;
    let mike = signup(&app, "mike_js").await;
    befriend(&app, &alex, &sarah).await;

    let response = post_json(
        &app,
        &format!("/challenges/{TWO_SUM}/attempts"),
        &alex.token,
        json!({ "language": "python", "invitee_ids": [sarah.id, alex.id] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let attempt = body_json(response).await;
    assert_eq!(attempt["status"], "in_progress");
    assert_eq!(attempt["participant_ids"], json!([sarah.id]));
    let attempt_uri = format!("/attempts/{}", attempt["id"].as_str().unwrap());

    let invites = body_json(get(&app, "/notifications", &sarah.token).await).await;
    assert_eq!(invites[0]["type"], "challenge_invite");

    // The invitee can find the attempt without being handed its id
    let mine = body_json(get(&app, "/attempts", &sarah.token).await).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["id"], attempt["id"]);
    assert_eq!(mine[0]["participant_ids"], json!([sarah.id]));
    assert!(body_json(get(&app, "/attempts", &mike.token).await).await.as_array().unwrap().is_empty());

    // Invitee may edit, outsiders may not look
    let response = put_json(&app, &format!("{attempt_uri}/code"), &sarah.token, json!({ "code": "print(1)" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get(&app, &attempt_uri, &mike.token).await.status(), StatusCode::FORBIDDEN);

    // Only the owner completes; points are capped at the challenge value
    let complete = format!("{attempt_uri}/complete");
    let response = post_json(&app, &complete, &sarah.token, json!({ "points_earned": 50 })).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = post_json(&app, &complete, &alex.token, json!({ "points_earned": 5000 })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let done = body_json(response).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["points_earned"], 100);

    let response = post_json(&app, &complete, &alex.token, json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn leaderboard_sums_completed_attempts() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;

    for (user, challenge, points) in [(&alex, TWO_SUM, Some(100)), (&alex, TWO_SUM, Some(50)), (&sarah, KNAPSACK, None)] {
        let response = post_json(&app, &format!("/challenges/{challenge}/attempts"), &user.token, json!({})).await;
        let id = body_json(response).await["id"].as_str().unwrap().to_string();
        if let Some(points) = points {
            let response = post_json(
                &app,
                &format!("/attempts/{id}/complete"),
                &user.token,
                json!({ "points_earned": points }),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    let board = body_json(get(&app, "/challenges/leaderboard", &alex.token).await).await;
    assert_eq!(
        board,
        json!([{ "rank": 1, "user_id": alex.id, "username": "alex_dev", "points": 150 }])
    );
}

#[tokio::test]
async fn completing_without_body_awards_full_points() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;

    let response = post_json(&app, &format!("/challenges/{KNAPSACK}/attempts"), &alex.token, json!({})).await;
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        axum::http::Method::POST,
        &format!("/attempts/{id}/complete"),
        Some(&alex.token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["points_earned"], 300);
}

#[tokio::test]
async fn only_friends_can_be_invited_to_attempts() {
    let (app, _) = build_test_app();
    let alex = signup(&app, "alex_dev").await;
    let sarah = signup(&app, "sarah_codes").await;

    let uri = format!("/challenges/{TWO_SUM}/attempts");
    let response = post_json(&app, &uri, &alex.token, json!({ "invitee_ids": [sarah.id] })).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "You can only invite friends");
    assert!(body_json(get(&app, "/attempts", &alex.token).await).await.as_array().unwrap().is_empty());
    assert!(body_json(get(&app, "/notifications", &sarah.token).await).await.as_array().unwrap().is_empty());

    // Solo attempts need no friends
    let response = post_json(&app, &uri, &alex.token, json!({})).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}
