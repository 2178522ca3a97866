//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all admin-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    ///
    /// Use this for testing authentication flows.
    /// For most tests, use `authenticated_admin()` instead.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client pre-authenticated as the admin member
    ///
    /// This is the most common way to create a test client; every
    /// maintenance job is permitted to the admin.
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated_admin(base_url: String) -> Self {
        let client = Self::new(base_url);

        let response = client.login(ADMIN_MEMBER, ADMIN_PASS).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Admin authentication failed: {:?}",
            response.text().await
        );

        client
    }

    /// Creates a client pre-authenticated as the moderator member
    pub async fn authenticated_moderator(base_url: String) -> Self {
        let client = Self::new(base_url);

        let response = client.login(MOD_MEMBER, MOD_PASS).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Moderator authentication failed: {:?}",
            response.text().await
        );

        client
    }

    /// Creates a client pre-authenticated as a regular member
    pub async fn authenticated(base_url: String) -> Self {
        let client = Self::new(base_url);

        let response = client.login(TEST_MEMBER, TEST_PASS).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Test member authentication failed: {:?}",
            response.text().await
        );

        client
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/login
    pub async fn login(&self, member_name: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&json!({
                "member_name": member_name,
                "password": password
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/logout", self.base_url))
            .send()
            .await
            .expect("Logout request failed")
    }

    // ========================================================================
    // Maintenance Endpoints
    // ========================================================================

    /// GET /v1/admin/maintenance/jobs
    pub async fn list_jobs(&self) -> Response {
        self.client
            .get(format!("{}/v1/admin/maintenance/jobs", self.base_url))
            .send()
            .await
            .expect("List jobs request failed")
    }

    /// Fetches the jobs listing and returns the minted one-time action token
    ///
    /// # Panics
    ///
    /// Panics if the listing fails or carries no token.
    pub async fn fetch_action_token(&self) -> String {
        let response = self.list_jobs().await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "Jobs listing failed"
        );
        let body: Value = response.json().await.expect("Jobs listing is not JSON");
        body["action_token"]
            .as_str()
            .expect("No action token in jobs listing")
            .to_string()
    }

    /// POST /v1/admin/maintenance/start
    pub async fn start_job(&self, body: &Value) -> Response {
        self.client
            .post(format!("{}/v1/admin/maintenance/start", self.base_url))
            .json(body)
            .send()
            .await
            .expect("Start job request failed")
    }

    /// POST /v1/admin/maintenance/continue
    pub async fn continue_job(&self, body: &Value) -> Response {
        self.client
            .post(format!("{}/v1/admin/maintenance/continue", self.base_url))
            .json(body)
            .send()
            .await
            .expect("Continue job request failed")
    }

    /// Starts a job and keeps echoing continuations until it leaves
    /// in_progress. Returns the terminal response body.
    ///
    /// Mints a fresh action token for the start request, so callers
    /// describe only the job itself.
    ///
    /// # Panics
    ///
    /// Panics if the job fails, or does not finish within
    /// `MAX_CONTINUATIONS` round-trips.
    pub async fn drive_job(&self, start_body: &Value) -> Value {
        let mut start_body = start_body.clone();
        start_body["action_token"] = Value::String(self.fetch_action_token().await);
        let response = self.start_job(&start_body).await;
        let mut status = response.status();
        let mut body: Value = response.json().await.expect("Start response is not JSON");

        let mut rounds = 0;
        while status == reqwest::StatusCode::ACCEPTED {
            rounds += 1;
            assert!(
                rounds <= MAX_CONTINUATIONS,
                "Job did not finish within {} continuations",
                MAX_CONTINUATIONS
            );
            let next = json!({
                "job": body["job"],
                "step": body["step"],
                "offset": body["offset"],
                "token": body["token"],
            });
            let response = self.continue_job(&next).await;
            status = response.status();
            body = response.json().await.expect("Continue response is not JSON");
        }

        assert_eq!(
            status,
            reqwest::StatusCode::OK,
            "Job ended with {}: {}",
            status,
            body
        );
        body
    }

    /// GET /v1/admin/maintenance/audit
    pub async fn get_audit(&self, limit: Option<usize>, offset: Option<usize>) -> Response {
        let mut url = format!("{}/v1/admin/maintenance/audit", self.base_url);
        let mut params = vec![];
        if let Some(l) = limit {
            params.push(format!("limit={}", l));
        }
        if let Some(o) = offset {
            params.push(format!("offset={}", o));
        }
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }
        self.client
            .get(&url)
            .send()
            .await
            .expect("Get audit request failed")
    }

    // ========================================================================
    // Health Check / System Endpoints
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    /// GET /metrics
    pub async fn metrics(&self) -> Response {
        self.client
            .get(format!("{}/metrics", self.base_url))
            .send()
            .await
            .expect("Metrics request failed")
    }
}
