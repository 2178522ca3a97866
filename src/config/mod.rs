mod file_config;

pub use file_config::{FileConfig, MaintenanceFileConfig};

use crate::maintenance::MaintenanceSettings;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub media_path: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub media_path: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Maintenance engine knobs (with defaults)
    pub maintenance: MaintenanceSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let media_path = file
            .media_path
            .map(PathBuf::from)
            .or_else(|| cli.media_path.clone())
            .unwrap_or_else(|| db_dir.clone());

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        // Maintenance settings - merge file config with defaults
        let defaults = MaintenanceSettings::default();
        let mt_file = file.maintenance.unwrap_or_default();
        let maintenance = MaintenanceSettings {
            budget: mt_file
                .budget_millis
                .map(Duration::from_millis)
                .unwrap_or(defaults.budget),
            row_chunk_size: mt_file.row_chunk_size.unwrap_or(defaults.row_chunk_size),
            attachment_chunk_size: mt_file
                .attachment_chunk_size
                .unwrap_or(defaults.attachment_chunk_size),
            walk_chunk_size: mt_file.walk_chunk_size.unwrap_or(defaults.walk_chunk_size),
            folder_file_limit: mt_file
                .folder_file_limit
                .unwrap_or(defaults.folder_file_limit),
            folder_byte_limit: mt_file
                .folder_byte_limit
                .unwrap_or(defaults.folder_byte_limit),
            temp_file_ttl: mt_file
                .temp_file_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.temp_file_ttl),
            state_ttl: mt_file
                .state_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.state_ttl),
            suggested_delay_seconds: mt_file
                .suggested_delay_seconds
                .unwrap_or(defaults.suggested_delay_seconds),
        };

        // A zero chunk size would make a run spin on the same offset forever.
        if maintenance.row_chunk_size == 0
            || maintenance.attachment_chunk_size == 0
            || maintenance.walk_chunk_size == 0
        {
            bail!("Maintenance chunk sizes must be greater than zero");
        }

        Ok(Self {
            db_dir,
            media_path,
            port,
            logging_level,
            frontend_dir_path,
            maintenance,
        })
    }

    pub fn forum_db_path(&self) -> PathBuf {
        self.db_dir.join("forum.db")
    }

    pub fn admin_db_path(&self) -> PathBuf {
        self.db_dir.join("admin.db")
    }

    /// Default directory for the first attachment folder on a fresh install.
    pub fn attachments_dir(&self) -> PathBuf {
        self.media_path.join("attachments")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
