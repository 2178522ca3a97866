use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{error, info};

use axum::{
    body::Body,
    extract::State,
    http::{response, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use super::maintenance_routes::make_maintenance_routes;
use super::metrics::{self, metrics_handler, record_login_attempt};
use super::session::Session;
use super::{log_requests, state::*, ServerConfig};
use crate::maintenance::{
    AdminJobStateStore, ContinuationChannel, DiskAttachmentFs, JobRunner, MaintenanceSettings,
    NullHostHints,
};
use crate::user::{verify_password, SessionTokenValue};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: &'static str,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub member_name: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION"),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

async fn login(State(state): State<ServerState>, Json(body): Json<LoginBody>) -> Response {
    let start = Instant::now();

    let member = match state.forum_store.member_by_name(&body.member_name) {
        Ok(Some(member)) => member,
        Ok(None) => {
            record_login_attempt("failure", start.elapsed());
            return StatusCode::FORBIDDEN.into_response();
        }
        Err(err) => {
            error!("Failed to look up member for login: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match verify_password(&body.password, &member.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            record_login_attempt("failure", start.elapsed());
            return StatusCode::FORBIDDEN.into_response();
        }
        Err(err) => {
            // Unreadable stored hash. Treat like a wrong password.
            error!("Password verification failed for {}: {}", member.name, err);
            record_login_attempt("failure", start.elapsed());
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let token = SessionTokenValue::generate();
    if let Err(err) = state.admin_store.insert_auth_token(&token.0, member.id) {
        error!("Error storing session token: {}", err);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    record_login_attempt("success", start.elapsed());

    let response_body = LoginSuccessResponse {
        token: token.0.clone(),
    };
    let response_body = serde_json::to_string(&response_body).unwrap();

    let cookie_value =
        HeaderValue::from_str(&format!("session_token={}; Path=/; HttpOnly", token.0)).unwrap();
    response::Builder::new()
        .status(StatusCode::CREATED)
        .header(axum::http::header::SET_COOKIE, cookie_value)
        .body(Body::from(response_body))
        .unwrap()
}

async fn logout(State(state): State<ServerState>, session: Session) -> Response {
    match state.admin_store.delete_auth_token(&session.token) {
        Ok(()) => {
            let cookie_value = Cookie::build(Cookie::new("session_token", ""))
                .path("/")
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1)) // Expire it in the past
                .same_site(SameSite::Lax)
                .build();

            response::Builder::new()
                .status(StatusCode::OK)
                .header(axum::http::header::SET_COOKIE, cookie_value.to_string())
                .body(Body::empty())
                .unwrap()
        }
        Err(err) => {
            error!("Failed to delete session token: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    forum_store: GuardedForumStore,
    admin_store: GuardedAdminStore,
    maintenance: MaintenanceSettings,
) -> Result<Router> {
    metrics::init_metrics();

    let job_state: GuardedJobStateStore = Arc::new(AdminJobStateStore::new(
        admin_store.clone(),
        maintenance.state_ttl,
    ));
    let job_runner = Arc::new(JobRunner::new(
        ContinuationChannel::new(job_state.clone(), maintenance.suggested_delay_seconds),
        admin_store.clone(),
    ));

    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        forum_store,
        admin_store,
        attachment_fs: Arc::new(DiskAttachmentFs),
        job_state,
        host_hints: Arc::new(NullHostHints),
        job_runner,
        maintenance,
    };

    let auth_routes: Router = Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(state.clone());

    let maintenance_routes = make_maintenance_routes(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let mut app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/admin/maintenance", maintenance_routes)
        .route("/metrics", get(metrics_handler));

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    config: ServerConfig,
    forum_store: GuardedForumStore,
    admin_store: GuardedAdminStore,
    maintenance: MaintenanceSettings,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, forum_store, admin_store, maintenance)?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
