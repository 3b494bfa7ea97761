use flatsync_model::{
    FieldAvailability, HashKey, MediaType, RemoteServerData, ServerConfig,
};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::decision::SyncDecision;
use super::fields::FieldContext;
use super::settings::SyncSettings;
use super::strategy::SyncStrategy;
use crate::availability::FieldAvailabilityIndex;
use crate::catalog::{CatalogRepository, CatalogSnapshot, Indexed, KeyedLocks};
use crate::database::ports::content_hashes::ContentHashStore;
use crate::error::Result;
use crate::remote::PassFetcher;

/// Hash write recorded during a pass and flushed after all phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HashStamp {
    pub key: HashKey,
    pub hash: String,
}

/// Result of consulting the hash manifest for one entity.
#[derive(Debug, Clone, Default)]
pub(crate) struct MetadataGate {
    pub skip_metadata: bool,
    pub declared: Option<String>,
}

/// Everything shared by the tasks of one server pass.
pub(crate) struct PassContext<'a> {
    pub server: &'a ServerConfig,
    pub data: &'a RemoteServerData,
    pub availability: &'a FieldAvailability,
    pub strategy: &'a SyncStrategy,
    pub snapshot: &'a CatalogSnapshot,
    pub repository: &'a CatalogRepository,
    pub hashes: &'a dyn ContentHashStore,
    pub fetcher: &'a PassFetcher,
    pub settings: &'a SyncSettings,
    pub entity_locks: &'a KeyedLocks,
    pub episode_permits: Semaphore,
    stamps: Mutex<Vec<HashStamp>>,
}

impl<'a> PassContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server: &'a ServerConfig,
        data: &'a RemoteServerData,
        availability: &'a FieldAvailability,
        strategy: &'a SyncStrategy,
        snapshot: &'a CatalogSnapshot,
        repository: &'a CatalogRepository,
        hashes: &'a dyn ContentHashStore,
        fetcher: &'a PassFetcher,
        settings: &'a SyncSettings,
        entity_locks: &'a KeyedLocks,
    ) -> Self {
        Self {
            server,
            data,
            availability,
            strategy,
            snapshot,
            repository,
            hashes,
            fetcher,
            settings,
            entity_locks,
            episode_permits: Semaphore::new(settings.episode_concurrency),
            stamps: Mutex::new(Vec::new()),
        }
    }

    pub fn field_context(
        &self,
        media_type: MediaType,
        title: &'a str,
    ) -> FieldContext<'a> {
        FieldContext {
            fetcher: self.fetcher,
            availability: FieldAvailabilityIndex::new(self.availability),
            media_type,
            title,
        }
    }

    /// Reads the stored copy of an entity. Call with the entity lock held.
    ///
    /// The snapshot was taken when the pass started and may predate writes
    /// by concurrent passes, so it only locates the document: `cached` is
    /// re-read by id, and a snapshot miss falls back to a natural-key
    /// lookup. The snapshot is updated with the result.
    pub async fn load_current<D: Indexed>(
        &self,
        cached: Option<D>,
        natural_key: &str,
    ) -> Result<Option<D>> {
        let current = match &cached {
            Some(doc) => self.repository.get_by_id::<D>(doc.id()).await?,
            None => {
                self.repository
                    .get_by_natural_key::<D>(natural_key)
                    .await?
            }
        };
        match (&current, cached) {
            (Some(fresh), cached) => {
                if cached.as_ref() != Some(fresh) {
                    debug!(
                        collection = D::COLLECTION,
                        id = %fresh.id(),
                        "stored copy differs from pass snapshot"
                    );
                    self.snapshot.upsert(fresh.clone());
                }
            }
            (None, Some(gone)) => {
                self.snapshot.remove::<D>(gone.id());
            }
            (None, None) => {}
        }
        Ok(current)
    }

    /// Compares the declared hash with the stored one. Metadata checks are
    /// skipped only when they match and `complete` confirms the catalog
    /// really holds what the hash describes.
    pub async fn metadata_gate(
        &self,
        key: HashKey,
        declared: Option<&str>,
        complete: impl FnOnce() -> bool,
    ) -> MetadataGate {
        let Some(declared) = declared else {
            return MetadataGate::default();
        };
        let stored = match self.hashes.get(&key, &self.server.id).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(server = %self.server.id, ?key, error = %err, "hash lookup failed");
                None
            }
        };
        let matches = stored.as_deref() == Some(declared);
        let skip_metadata = matches && complete();
        if matches && !skip_metadata {
            debug!(?key, "hash matches but catalog is incomplete; re-checking");
        }
        MetadataGate {
            skip_metadata,
            declared: Some(declared.to_string()),
        }
    }

    /// Queues a hash write if the decision permits it.
    pub fn stamp(&self, key: HashKey, gate: &MetadataGate, decision: &SyncDecision) {
        let Some(hash) = gate.declared.as_ref() else {
            return;
        };
        if !decision.errors.is_empty() || !decision.authorized_to_stamp_hash() {
            return;
        }
        self.stamps.lock().push(HashStamp {
            key,
            hash: hash.clone(),
        });
    }

    /// Writes queued hashes; failures are logged and skipped.
    pub async fn flush_stamps(&self) -> usize {
        let stamps = std::mem::take(&mut *self.stamps.lock());
        let mut stored = 0;
        for stamp in stamps {
            match self
                .hashes
                .store(&stamp.key, &stamp.hash, &self.server.id)
                .await
            {
                Ok(()) => stored += 1,
                Err(err) => warn!(
                    server = %self.server.id,
                    key = ?stamp.key,
                    error = %err,
                    "failed to store content hash"
                ),
            }
        }
        stored
    }
}
