//! End-to-end tests for the maintenance jobs endpoints
//!
//! Covers the job listing, action token protocol, permission gating,
//! and the jobs that complete within a single request budget.

mod common;

use common::{TestClient, TestServer};
use piazza_admin_server::forum_store::NewMessage;
use piazza_admin_server::ForumStore;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_jobs_listing_returns_every_job_for_admin() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let response = client.list_jobs().await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["action_token"].as_str().unwrap().len(), 32);

    let jobs = body["jobs"].as_array().unwrap();
    let names: Vec<&str> = jobs.iter().map(|j| j["job"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec![
            "recount_totals",
            "repair_attachments",
            "transfer_attachments",
            "move_topics",
            "rebuild_bodies",
        ]
    );
    for job in jobs {
        assert!(!job["description"].as_str().unwrap().is_empty());
        assert_eq!(job["allowed"], json!(true));
        assert_eq!(job["in_progress"], json!(false));
    }
    assert_eq!(jobs[0]["permission"], json!("AdminForum"));
    assert_eq!(jobs[1]["permission"], json!("ManageAttachments"));
    assert_eq!(jobs[3]["permission"], json!("ManageBoards"));
}

#[tokio::test]
async fn test_jobs_listing_allowed_flags_follow_member_role() {
    let server = TestServer::spawn().await;

    for client in [
        TestClient::authenticated_moderator(server.base_url.clone()).await,
        TestClient::authenticated(server.base_url.clone()).await,
    ] {
        let response = client.list_jobs().await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        for job in body["jobs"].as_array().unwrap() {
            assert_eq!(job["allowed"], json!(false), "job {} allowed", job["job"]);
        }
    }
}

#[tokio::test]
async fn test_each_listing_mints_a_fresh_action_token() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let first = client.fetch_action_token().await;
    let second = client.fetch_action_token().await;
    assert_ne!(first, second);

    // The second listing replaced the stored token.
    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": first}))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": second}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_recount_totals_reports_forum_counts() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let body = client.drive_job(&json!({"job": "recount_totals"})).await;

    assert_eq!(body["status"], json!("completed"));
    assert_eq!(body["job"], json!("recount_totals"));
    assert_eq!(
        body["summary"],
        json!({
            "result": "recount",
            "topics": 1,
            "boards": 2,
            "members": 3,
            "messages_repointed": 0,
        })
    );
}

#[tokio::test]
async fn test_recount_totals_is_idempotent() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let first = client.drive_job(&json!({"job": "recount_totals"})).await;
    let second = client.drive_job(&json!({"job": "recount_totals"})).await;
    assert_eq!(first["summary"], second["summary"]);
}

#[tokio::test]
async fn test_start_with_bogus_action_token_is_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": "bogus"}))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("action token"));
}

#[tokio::test]
async fn test_action_token_is_single_use() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The token went with the first start.
    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_job_is_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({"job": "optimize_tables", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("unknown job 'optimize_tables'"));
}

#[tokio::test]
async fn test_missing_job_options_are_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    // move_topics without its board fields.
    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({"job": "move_topics", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_moving_topics_onto_the_same_board_is_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({
            "job": "move_topics",
            "action_token": token,
            "from_board": server.seeded.board_1_id,
            "to_board": server.seeded.board_1_id,
        }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid job options"));
}

#[tokio::test]
async fn test_moving_topics_to_a_missing_board_is_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({
            "job": "move_topics",
            "action_token": token,
            "from_board": server.seeded.board_1_id,
            "to_board": 9999,
        }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("board 9999 does not exist"));
}

#[tokio::test]
async fn test_move_topics_drains_the_source_board() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let body = client
        .drive_job(&json!({
            "job": "move_topics",
            "from_board": server.seeded.board_1_id,
            "to_board": server.seeded.board_2_id,
        }))
        .await;

    assert_eq!(
        body["summary"],
        json!({
            "result": "topics_moved",
            "moved": 1,
            "from_board": server.seeded.board_1_id,
            "to_board": server.seeded.board_2_id,
        })
    );

    let store = server.forum_store.as_ref();
    assert_eq!(
        store
            .count_topics_on_board(server.seeded.board_1_id)
            .unwrap(),
        0
    );
    let destination = store.board(server.seeded.board_2_id).unwrap().unwrap();
    assert_eq!(destination.num_topics, 1);
    assert_eq!(destination.num_posts, 3);
}

#[tokio::test]
async fn test_rebuild_bodies_rewrites_encoded_messages() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let encoded = server
        .forum_store
        .create_message(&NewMessage {
            topic_id: server.seeded.topic_id,
            board_id: server.seeded.board_1_id,
            member_id: 0,
            subject: "Fish &amp; Chips".to_string(),
            body: "It&#39;s &lt;great&gt;".to_string(),
            approved: true,
        })
        .unwrap();

    let body = client.drive_job(&json!({"job": "rebuild_bodies"})).await;
    assert_eq!(
        body["summary"],
        json!({
            "result": "bodies_rebuilt",
            "examined": 4,
            "rewritten": 1,
        })
    );

    let message = server.forum_store.message(encoded.id).unwrap().unwrap();
    assert_eq!(message.subject, "Fish & Chips");
    assert_eq!(message.body, "It's <great>");
}

#[tokio::test]
async fn test_permission_is_checked_before_the_action_token() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_moderator(server.base_url.clone()).await;

    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": "irrelevant"}))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("AdminForum"));
}

#[tokio::test]
async fn test_regular_member_may_not_start_any_job() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    for job in [
        "recount_totals",
        "repair_attachments",
        "transfer_attachments",
        "move_topics",
        "rebuild_bodies",
    ] {
        let response = client
            .start_job(&json!({"job": job, "action_token": token}))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "job {job}");
    }
}
