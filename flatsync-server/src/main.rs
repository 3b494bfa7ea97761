//! # flatsync
//!
//! Runs one full reconciliation: every configured file server is fetched,
//! synced into the catalog in priority order, and the reaper removes what
//! no server offers any more.
//!
//! The catalog lives in Postgres when a database URL is configured and in
//! memory otherwise. Redis cache keys are invalidated when Redis is
//! configured.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use flatsync_config::{
    Config, ConfigLoad, ConfigLoader, SyncConfig, telemetry,
};
use flatsync_core::database::{
    CacheInvalidator, CatalogStore, ContentHashStore, InMemoryCatalogStore,
    InMemoryContentHashStore, NoopCacheInvalidator, PostgresCatalogStore,
    PostgresContentHashStore, RedisCacheInvalidator,
    infrastructure::postgres,
};
use flatsync_core::{
    AvailabilityReaper, DriverReport, HttpRemoteClient, NoopNotificationSink,
    SyncDriver, SyncEngine, SyncSettings,
};
use tracing::{error, info, warn};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "flatsync")]
#[command(about = "Reconcile media file servers into one flat catalog")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to flatsync.toml (overrides FLATSYNC_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to a .env file to load before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Sync only; leave unavailable entities in place
    #[arg(long, env = "FLATSYNC_SKIP_REAPER", default_value_t = false)]
    skip_reaper: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply catalog migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli)?;

    if let Some(Command::Db(DbCommand::Migrate)) = cli.command {
        let url = config
            .database
            .url
            .as_deref()
            .context("db migrate needs DATABASE_URL or [database].url")?;
        postgres::connect(url, config.database.max_connections)
            .await
            .context("database migration failed")?;
        info!("Database migrations applied successfully");
        return Ok(ExitCode::SUCCESS);
    }

    let report = run_sync(&config, cli.skip_reaper).await?;
    if cli.json {
        let rendered = serde_json::to_string_pretty(&report)
            .context("failed to render run report")?;
        println!("{rendered}");
    }

    if report.failed_servers().next().is_some() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn load_runtime_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &cli.env_file {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;

    telemetry::init_tracing();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    Ok(config)
}

fn engine_settings(sync: &SyncConfig) -> SyncSettings {
    SyncSettings {
        movie_concurrency: sync.movie_concurrency,
        show_concurrency: sync.show_concurrency,
        season_concurrency: sync.season_concurrency,
        episode_concurrency: sync.episode_concurrency,
        hash_based: sync.hash_based,
        probe_timeout: sync.probe_timeout,
        batch_delay: sync.batch_delay,
    }
}

async fn open_stores(
    config: &Config,
) -> anyhow::Result<(Arc<dyn CatalogStore>, Arc<dyn ContentHashStore>)> {
    match config.database.url.as_deref() {
        Some(url) => {
            let pool = postgres::connect(url, config.database.max_connections)
                .await
                .context("failed to connect to the catalog database")?;
            Ok((
                Arc::new(PostgresCatalogStore::new(pool.clone())),
                Arc::new(PostgresContentHashStore::new(pool)),
            ))
        }
        None => {
            info!("no database configured; using the in-memory catalog");
            Ok((
                Arc::new(InMemoryCatalogStore::new()),
                Arc::new(InMemoryContentHashStore::new()),
            ))
        }
    }
}

async fn open_invalidator(config: &Config) -> Arc<dyn CacheInvalidator> {
    let Some(redis) = &config.redis else {
        return Arc::new(NoopCacheInvalidator);
    };
    match RedisCacheInvalidator::new(&redis.url).await {
        Ok(invalidator) => Arc::new(invalidator),
        Err(err) => {
            warn!(error = %err, "redis unavailable; cache invalidation disabled");
            Arc::new(NoopCacheInvalidator)
        }
    }
}

async fn run_sync(
    config: &Config,
    skip_reaper: bool,
) -> anyhow::Result<DriverReport> {
    let (store, hashes) = open_stores(config).await?;
    let invalidator = open_invalidator(config).await;
    let client = Arc::new(
        HttpRemoteClient::new(config.sync.probe_timeout)
            .context("failed to build the file server client")?,
    );

    let engine = SyncEngine::new(
        store,
        hashes,
        client.clone(),
        engine_settings(&config.sync),
    );
    let reaper =
        AvailabilityReaper::new(engine.repository().clone(), invalidator);
    let driver = SyncDriver::new(
        engine,
        reaper,
        client,
        Arc::new(NoopNotificationSink),
    )
    .with_skip_reaper(skip_reaper || config.sync.skip_reaper);

    let report = driver.run(&config.servers, None).await;

    for outcome in &report.servers {
        match &outcome.result {
            Ok(sync) => info!(
                target: "sync::summary",
                server = %outcome.server_id,
                changed = sync.changed_count(),
                errors = sync.error_count(),
                "server synced"
            ),
            Err(err) => error!(
                target: "sync::summary",
                server = %outcome.server_id,
                error = %err,
                "server failed"
            ),
        }
    }
    if let Some(reap) = &report.reap {
        info!(
            target: "sync::reaper",
            removed = reap.removed.total(),
            retained_unranked = reap.retained_unranked,
            errors = reap.errors.len(),
            "run complete"
        );
    }

    Ok(report)
}
