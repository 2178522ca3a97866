//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own forum and admin
//! databases in a temp directory.

use super::constants::*;
use super::fixtures::{seed_forum_content, seed_members, SeededForum};
use piazza_admin_server::maintenance::MaintenanceSettings;
use piazza_admin_server::server::{server::make_app, RequestsLoggingLevel, ServerConfig};
use piazza_admin_server::{AdminStore, ForumStore, SqliteAdminStore, SqliteForumStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with isolated forum and admin databases
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Forum store for direct database access in tests
    pub forum_store: Arc<dyn ForumStore>,

    /// Admin store for direct audit log inspection in tests
    pub admin_store: Arc<dyn AdminStore>,

    /// Root directory for attachment folders created by tests
    pub media_dir: PathBuf,

    /// Ids of the seeded boards and topic
    pub seeded: SeededForum,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server with default maintenance settings
    pub async fn spawn() -> Self {
        Self::spawn_with(MaintenanceSettings::default()).await
    }

    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Creates temporary forum and admin databases with test members
    /// 2. Seeds a small forum (two boards, one topic, a few messages)
    /// 3. Binds to a random port (127.0.0.1:0)
    /// 4. Spawns the server in a background task
    /// 5. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - Database creation or seeding fails
    /// - Port binding fails
    /// - Server fails to start
    /// - Server doesn't become ready within timeout
    pub async fn spawn_with(maintenance: MaintenanceSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let media_dir = temp_dir.path().join("media");
        std::fs::create_dir_all(&media_dir).expect("Failed to create media dir");

        let forum_store: Arc<dyn ForumStore> = Arc::new(
            SqliteForumStore::new(temp_dir.path().join("forum.db"))
                .expect("Failed to open forum store"),
        );
        seed_members(forum_store.as_ref()).expect("Failed to seed members");
        let seeded = seed_forum_content(forum_store.as_ref()).expect("Failed to seed forum");

        let admin_store: Arc<dyn AdminStore> = Arc::new(
            SqliteAdminStore::new(temp_dir.path().join("admin.db"))
                .expect("Failed to open admin store"),
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
        };

        let app = make_app(config, forum_store.clone(), admin_store.clone(), maintenance)
            .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        // Wait for server to be ready
        let server = Self {
            base_url,
            port,
            forum_store,
            admin_store,
            media_dir,
            seeded,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
