use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use flatsync_model::{FieldAvailability, RemoteServerData, ServerConfig};
use tracing::{info, instrument};

use super::episodes::sync_episodes;
use super::movies::sync_movies;
use super::pass::PassContext;
use super::report::{PerformanceStats, SyncReport, millis};
use super::seasons::sync_seasons;
use super::settings::SyncSettings;
use super::shows::sync_shows;
use super::strategy::detect_strategy;
use crate::catalog::{CatalogRepository, CatalogSnapshot, KeyedLocks};
use crate::database::ports::catalog::CatalogStore;
use crate::database::ports::content_hashes::ContentHashStore;
use crate::error::Result;
use crate::remote::{PassFetcher, RemoteServerClient};

/// Reconciles one server's data into the catalog.
///
/// Movies and shows run concurrently; seasons follow once shows are in
/// place, then episodes. The catalog snapshot and the fetch memo live for
/// exactly one pass.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn CatalogStore>,
    hashes: Arc<dyn ContentHashStore>,
    client: Arc<dyn RemoteServerClient>,
    repository: CatalogRepository,
    entity_locks: Arc<KeyedLocks>,
    settings: SyncSettings,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("settings", &self.settings)
            .finish()
    }
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        hashes: Arc<dyn ContentHashStore>,
        client: Arc<dyn RemoteServerClient>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            repository: CatalogRepository::new(Arc::clone(&store)),
            store,
            hashes,
            client,
            entity_locks: Arc::new(KeyedLocks::new()),
            settings: settings.normalized(),
        }
    }

    pub fn repository(&self) -> &CatalogRepository {
        &self.repository
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Fails only when the pass cannot start (bad server config, catalog
    /// unreadable); per-entity failures land in the report.
    #[instrument(skip_all, fields(server = %server.id))]
    pub async fn sync_all(
        &self,
        data: &RemoteServerData,
        server: &ServerConfig,
        availability: &FieldAvailability,
    ) -> Result<SyncReport> {
        server.validate()?;
        let started = Instant::now();

        let snapshot = CatalogSnapshot::build(&*self.store).await?;
        let snapshot_ms = millis(started.elapsed());

        let strategy =
            detect_strategy(&*self.client, server, &self.settings).await;
        let fetcher = PassFetcher::new(Arc::clone(&self.client), server.clone());
        let pass = PassContext::new(
            server,
            data,
            availability,
            &strategy,
            &snapshot,
            &self.repository,
            &*self.hashes,
            &fetcher,
            &self.settings,
            &self.entity_locks,
        );

        let phase = Instant::now();
        let (movies, tv_shows) =
            tokio::join!(sync_movies(&pass), sync_shows(&pass));
        let movies_and_shows_ms = millis(phase.elapsed());

        let phase = Instant::now();
        let seasons = sync_seasons(&pass).await;
        let seasons_ms = millis(phase.elapsed());

        let phase = Instant::now();
        let episodes = sync_episodes(&pass).await;
        let episodes_ms = millis(phase.elapsed());

        let hashes_stored = pass.flush_stamps().await;
        self.entity_locks.prune();
        self.repository.prune_locks();

        let report = SyncReport {
            server_id: server.id.clone(),
            movies,
            tv_shows,
            seasons,
            episodes,
            performance: PerformanceStats {
                strategy: strategy.kind(),
                total_ms: millis(started.elapsed()),
                snapshot_ms,
                movies_and_shows_ms,
                seasons_ms,
                episodes_ms,
                fetches: fetcher.counters(),
                hashes_stored,
                catalog: snapshot.counts(),
            },
        };

        info!(
            target: "sync::summary",
            strategy = ?report.performance.strategy,
            changed = report.changed_count(),
            errors = report.error_count(),
            total_ms = report.performance.total_ms,
            "server sync finished"
        );
        Ok(report)
    }
}
