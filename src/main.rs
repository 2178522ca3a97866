use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use piazza_admin_server::config::{AppConfig, CliConfig, FileConfig};
use piazza_admin_server::maintenance::{AdminJobStateStore, JobStateStore};
use piazza_admin_server::server::{run_server, RequestsLoggingLevel, ServerConfig};
use piazza_admin_server::{AdminStore, ForumStore, SqliteAdminStore, SqliteForumStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often the background sweep clears expired job state and stale
/// auth tokens.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Auth tokens unused for this long are removed by the sweep.
const AUTH_TOKEN_RETENTION_DAYS: i64 = 30;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the forum and admin SQLite databases.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to the attachment media directory. Defaults to the database directory.
    #[clap(long, value_parser = parse_path)]
    pub media_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Path to a TOML config file. File values override CLI values.
    #[clap(short, long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };

    let cli_config = CliConfig {
        db_dir: cli_args.db_dir,
        media_path: cli_args.media_path,
        port: cli_args.port,
        logging_level: cli_args.logging_level,
        frontend_dir_path: cli_args.frontend_dir_path,
    };

    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!(
        "Opening SQLite forum database at {:?}...",
        config.forum_db_path()
    );
    let forum_store = Arc::new(SqliteForumStore::new(config.forum_db_path())?);

    info!(
        "Opening SQLite admin database at {:?}...",
        config.admin_db_path()
    );
    let admin_store = Arc::new(SqliteAdminStore::new(config.admin_db_path())?);

    // A fresh install has no attachment folders yet. Seed one so uploads
    // and the maintenance jobs have somewhere to point.
    if forum_store.attachment_folders()?.is_empty() {
        let dir = config.attachments_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create attachments directory {:?}", dir))?;
        forum_store.create_attachment_folder(&dir.to_string_lossy())?;
        info!("Created initial attachment folder at {:?}", dir);
    }

    // Background sweep: suspended job state past its lifetime and auth
    // tokens nobody has used in a while.
    let sweeper_state = AdminJobStateStore::new(admin_store.clone(), config.maintenance.state_ttl);
    let sweeper_admin: Arc<dyn AdminStore> = admin_store.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match sweeper_state.purge_expired() {
                Ok(count) => {
                    if count > 0 {
                        info!("Purged {} expired job state entries", count);
                    }
                }
                Err(e) => {
                    error!("Failed to purge expired job state: {}", e);
                }
            }

            let cutoff = Utc::now() - chrono::Duration::days(AUTH_TOKEN_RETENTION_DAYS);
            match sweeper_admin.cleanup_stale_auth_tokens(cutoff) {
                Ok(count) => {
                    if count > 0 {
                        info!("Removed {} stale auth tokens", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean up stale auth tokens: {}", e);
                }
            }
        }
    });

    info!("Ready to serve at port {}!", config.port);
    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        frontend_dir_path: config.frontend_dir_path.clone(),
    };
    run_server(server_config, forum_store, admin_store, config.maintenance).await
}
