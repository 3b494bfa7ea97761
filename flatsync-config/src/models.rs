use std::path::PathBuf;
use std::time::Duration;

use flatsync_model::ServerConfig;

pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Fully composed configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// In sync order.
    pub servers: Vec<ServerConfig>,
    pub sync: SyncConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub metadata: ConfigMetadata,
}

/// Pass tuning; mirrors the engine's settings without depending on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub movie_concurrency: usize,
    pub show_concurrency: usize,
    pub season_concurrency: usize,
    pub episode_concurrency: usize,
    pub hash_based: bool,
    pub probe_timeout: Duration,
    pub batch_delay: Duration,
    pub skip_reaper: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            movie_concurrency: 20,
            show_concurrency: 20,
            season_concurrency: 20,
            episode_concurrency: 120,
            hash_based: true,
            probe_timeout: Duration::from_secs(2),
            batch_delay: Duration::ZERO,
            skip_reaper: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// `None` keeps the catalog in memory for the run.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
