use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub media_path: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Feature configs
    pub maintenance: Option<MaintenanceFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MaintenanceFileConfig {
    pub budget_millis: Option<u64>,
    pub row_chunk_size: Option<u64>,
    pub attachment_chunk_size: Option<u64>,
    pub walk_chunk_size: Option<u64>,
    pub folder_file_limit: Option<u64>,
    pub folder_byte_limit: Option<u64>,
    pub temp_file_ttl_secs: Option<u64>,
    pub state_ttl_secs: Option<u64>,
    pub suggested_delay_seconds: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
