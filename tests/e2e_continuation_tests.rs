//! End-to-end tests for the job continuation protocol
//!
//! These servers run with a zero time budget, so every admitted request
//! commits exactly one chunk and then suspends. On the small seeded
//! forum that makes the whole conversation deterministic.

mod common;

use common::{TestClient, TestServer, MAX_CONTINUATIONS};
use piazza_admin_server::maintenance::MaintenanceSettings;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

async fn zero_budget_server() -> TestServer {
    TestServer::spawn_with(MaintenanceSettings {
        budget: Duration::ZERO,
        ..MaintenanceSettings::default()
    })
    .await
}

fn echo_from(body: &serde_json::Value) -> serde_json::Value {
    json!({
        "job": body["job"],
        "step": body["step"],
        "offset": body["offset"],
        "token": body["token"],
    })
}

#[tokio::test]
async fn test_zero_budget_walks_the_job_one_chunk_per_request() {
    let server = zero_budget_server().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let mut body: serde_json::Value = response.json().await.unwrap();

    let mut percents = Vec::new();
    for _ in 0..MAX_CONTINUATIONS {
        assert_eq!(body["status"], json!("in_progress"));
        assert_eq!(body["job"], json!("recount_totals"));
        assert_eq!(body["token"].as_str().unwrap().len(), 32);
        assert_eq!(body["suggested_delay_seconds"], json!(2));
        percents.push(body["percent_complete"].as_u64().unwrap());

        let response = client.continue_job(&echo_from(&body)).await;
        match response.status() {
            StatusCode::ACCEPTED => body = response.json().await.unwrap(),
            StatusCode::OK => {
                body = response.json().await.unwrap();
                break;
            }
            other => panic!("unexpected status {other}: {}", response.text().await.unwrap()),
        }
    }

    // The six recount stages hold one chunk each, so six suspensions.
    // 100 is reserved for the terminal response.
    assert_eq!(percents, vec![17, 33, 50, 67, 83, 99]);
    assert_eq!(body["status"], json!("completed"));
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
async fn test_tampered_echo_is_rejected_without_losing_the_run() {
    let server = zero_budget_server().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let suspended: serde_json::Value = response.json().await.unwrap();

    let mut tampered = echo_from(&suspended);
    tampered["offset"] = json!(suspended["offset"].as_u64().unwrap() + 8);
    let response = client.continue_job(&tampered).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("continuation token"));

    // The rejection did not consume the parked state.
    let response = client.continue_job(&echo_from(&suspended)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["step"], json!(1));
}

#[tokio::test]
async fn test_a_continuation_token_is_good_for_one_resume() {
    let server = zero_budget_server().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let first: serde_json::Value = response.json().await.unwrap();

    let response = client.continue_job(&echo_from(&first)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let second: serde_json::Value = response.json().await.unwrap();
    assert_ne!(first["token"], second["token"]);

    // The first token was consumed by the second suspension.
    let response = client.continue_job(&echo_from(&first)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_a_finished_job_cannot_be_resumed() {
    let server = zero_budget_server().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let mut last: serde_json::Value = response.json().await.unwrap();

    for _ in 0..MAX_CONTINUATIONS {
        let response = client.continue_job(&echo_from(&last)).await;
        match response.status() {
            StatusCode::ACCEPTED => last = response.json().await.unwrap(),
            StatusCode::OK => break,
            other => panic!("unexpected status {other}"),
        }
    }

    let response = client.continue_job(&echo_from(&last)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("no suspended run"));
}

#[tokio::test]
async fn test_continuing_without_a_suspended_run_is_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let response = client
        .continue_job(&json!({
            "job": "recount_totals",
            "step": 0,
            "offset": 0,
            "token": "a".repeat(32),
        }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listing_marks_a_suspended_job_in_progress() {
    let server = zero_budget_server().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let mut last: serde_json::Value = response.json().await.unwrap();

    let listing = client.list_jobs().await;
    let body: serde_json::Value = listing.json().await.unwrap();
    for job in body["jobs"].as_array().unwrap() {
        let expected = job["job"] == json!("recount_totals");
        assert_eq!(job["in_progress"], json!(expected), "job {}", job["job"]);
    }

    // Run it down; the flag clears with the terminal response.
    for _ in 0..MAX_CONTINUATIONS {
        let response = client.continue_job(&echo_from(&last)).await;
        match response.status() {
            StatusCode::ACCEPTED => last = response.json().await.unwrap(),
            StatusCode::OK => break,
            other => panic!("unexpected status {other}"),
        }
    }
    let listing = client.list_jobs().await;
    let body: serde_json::Value = listing.json().await.unwrap();
    for job in body["jobs"].as_array().unwrap() {
        assert_eq!(job["in_progress"], json!(false));
    }
}

#[tokio::test]
async fn test_starting_fresh_abandons_a_suspended_run() {
    let server = zero_budget_server().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let abandoned: serde_json::Value = response.json().await.unwrap();

    let token = client.fetch_action_token().await;
    let response = client
        .start_job(&json!({"job": "recount_totals", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let fresh: serde_json::Value = response.json().await.unwrap();
    assert_eq!(fresh["percent_complete"], json!(17));

    // The old run's echo no longer matches anything.
    assert_ne!(abandoned["token"], fresh["token"]);
    let response = client.continue_job(&echo_from(&abandoned)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_continuations_are_scoped_to_the_login_session() {
    let server = zero_budget_server().await;
    let first = TestClient::authenticated_admin(server.base_url.clone()).await;
    let second = TestClient::authenticated_admin(server.base_url.clone()).await;

    let token = first.fetch_action_token().await;
    let response = first
        .start_job(&json!({"job": "recount_totals", "action_token": token}))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let suspended: serde_json::Value = response.json().await.unwrap();

    // Same member, different login: the parked run is not theirs.
    let response = second.continue_job(&echo_from(&suspended)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let listing = second.list_jobs().await;
    let body: serde_json::Value = listing.json().await.unwrap();
    for job in body["jobs"].as_array().unwrap() {
        assert_eq!(job["in_progress"], json!(false));
    }

    // The owner can still continue.
    let response = first.continue_job(&echo_from(&suspended)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}
