use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub servers: Vec<FileServerEntry>,
    #[serde(default)]
    pub sync: FileSyncConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    pub redis: Option<FileRedisConfig>,
}

/// One `[[servers]]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileServerEntry {
    pub id: String,
    /// Lower numbers win; defaults to the entry's 1-based position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSyncConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_based: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reaper: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
}

/// Overrides read from the process environment.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub episode_concurrency: Option<usize>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: std::env::var("FLATSYNC_CONFIG")
                .ok()
                .map(PathBuf::from),
            database_url: std::env::var("DATABASE_URL").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            episode_concurrency: std::env::var("FLATSYNC_EPISODE_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}
