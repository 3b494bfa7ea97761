use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flatsync_model::ServerConfig;
use thiserror::Error;
use url::Url;

use crate::models::{
    Config, ConfigMetadata, DEFAULT_MAX_CONNECTIONS, DEFAULT_SERVER_TIMEOUT,
    DatabaseConfig, RedisConfig, SyncConfig,
};
use crate::sources::{EnvConfig, FileConfig, FileServerEntry, FileSyncConfig};
use crate::validation::ConfigWarnings;

const DEFAULT_CONFIG_LOCATIONS: &[&str] =
    &["flatsync.toml", "config/flatsync.toml"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env` (when present), gathers the environment and composes.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Composes against an explicit environment snapshot.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path)
        {
            (Some(path), _) | (None, Some(path)) => (path.clone(), true),
            (None, None) => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => (path, false),
                None => return Ok((None, None)),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if file_config.is_none() {
        warnings.push_with_hint(
            "No flatsync.toml detected; falling back to environment variables",
            "Create flatsync.toml with at least one [[servers]] table",
        );
    }

    let FileConfig {
        servers: file_servers,
        sync: file_sync,
        database: file_database,
        redis: file_redis,
    } = file_config.unwrap_or_default();

    let servers = compose_servers(&file_servers, &mut warnings)?;
    let sync = compose_sync(&file_sync, &env, &mut warnings);

    let url = env
        .database_url
        .clone()
        .or(file_database.url)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    if let Some(url) = &url {
        Url::parse(url)
            .map_err(|source| ConfigLoadError::InvalidDatabaseUrl { source })?;
    } else {
        warnings.push_with_hint(
            "No database configured; the catalog only lives for this run",
            "Set DATABASE_URL or [database].url",
        );
    }
    let database = DatabaseConfig {
        url,
        max_connections: file_database
            .max_connections
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
    };

    let redis = env
        .redis_url
        .map(|url| RedisConfig { url })
        .or_else(|| file_redis.map(|r| RedisConfig { url: r.url }));

    let config = Config {
        servers,
        sync,
        database,
        redis,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };
    Ok((config, warnings))
}

fn compose_servers(
    entries: &[FileServerEntry],
    warnings: &mut ConfigWarnings,
) -> Result<Vec<ServerConfig>, ConfigLoadError> {
    if entries.is_empty() {
        warnings.push("No servers configured; nothing will be synced");
    }

    let mut seen = HashSet::new();
    let mut priorities: HashMap<u32, &str> = HashMap::new();
    let mut servers = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let id = entry.id.trim();
        if !seen.insert(id.to_string()) {
            return Err(ConfigLoadError::DuplicateServer { id: id.to_string() });
        }

        let priority = entry
            .priority
            .unwrap_or_else(|| u32::try_from(position + 1).unwrap_or(u32::MAX));
        if let Some(other) = priorities.insert(priority, id) {
            warnings.push_with_hint(
                format!("Servers {other} and {id} share priority {priority}"),
                "Ties are broken by server id",
            );
        }

        let timeout = match entry.timeout_secs {
            Some(0) => {
                return Err(ConfigLoadError::InvalidServer {
                    id: id.to_string(),
                    reason: "timeout_secs must be greater than zero"
                        .to_string(),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_SERVER_TIMEOUT,
        };

        let server =
            ServerConfig::new(id, priority, entry.base_url.trim(), timeout);
        server
            .validate()
            .map_err(|err| ConfigLoadError::InvalidServer {
                id: id.to_string(),
                reason: err.to_string(),
            })?;
        servers.push(server);
    }
    Ok(servers)
}

fn compose_sync(
    file: &FileSyncConfig,
    env: &EnvConfig,
    warnings: &mut ConfigWarnings,
) -> SyncConfig {
    let defaults = SyncConfig::default();
    let mut cap = |name: &str, value: Option<usize>, default: usize| match value
    {
        Some(0) => {
            warnings.push(format!("{name} of 0 raised to 1"));
            1
        }
        Some(n) => n,
        None => default,
    };

    SyncConfig {
        movie_concurrency: cap(
            "movie_concurrency",
            file.movie_concurrency,
            defaults.movie_concurrency,
        ),
        show_concurrency: cap(
            "show_concurrency",
            file.show_concurrency,
            defaults.show_concurrency,
        ),
        season_concurrency: cap(
            "season_concurrency",
            file.season_concurrency,
            defaults.season_concurrency,
        ),
        episode_concurrency: cap(
            "episode_concurrency",
            env.episode_concurrency.or(file.episode_concurrency),
            defaults.episode_concurrency,
        ),
        hash_based: file.hash_based.unwrap_or(defaults.hash_based),
        probe_timeout: file
            .probe_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.probe_timeout),
        batch_delay: file
            .batch_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.batch_delay),
        skip_reaper: file.skip_reaper.unwrap_or(defaults.skip_reaper),
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("server '{id}' is configured more than once")]
    DuplicateServer { id: String },
    #[error("invalid server '{id}': {reason}")]
    InvalidServer { id: String, reason: String },
    #[error("invalid database URL")]
    InvalidDatabaseUrl {
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
