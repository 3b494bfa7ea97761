use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::document::CatalogDocument;
use super::locks::KeyedLocks;
use crate::database::ports::catalog::CatalogStore;
use crate::error::Result;

/// How a catalog entity was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    /// Already stored (possibly after an id repair).
    Found(T),
    /// Inserted by this call.
    Created(T),
    /// Parent created on the fly for a child whose own phase had not
    /// produced it.
    Synthesized(T),
}

impl<T> Resolved<T> {
    pub fn get(&self) -> &T {
        match self {
            Resolved::Found(v) | Resolved::Created(v) | Resolved::Synthesized(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Resolved::Found(v) | Resolved::Created(v) | Resolved::Synthesized(v) => v,
        }
    }

    /// True unless the entity was already stored.
    pub fn is_new(&self) -> bool {
        !matches!(self, Resolved::Found(_))
    }

    pub fn synthesized(self) -> Self {
        match self {
            Resolved::Created(v) => Resolved::Synthesized(v),
            other => other,
        }
    }
}

/// Deduplicating access to the flat catalog collections.
///
/// Creation runs a two-phase lookup: identity key first, natural key second.
/// A natural-key hit has its parent ids repaired in place. A unique-key
/// collision on insert is retried once as a lookup plus update.
#[derive(Clone)]
pub struct CatalogRepository {
    store: Arc<dyn CatalogStore>,
    create_locks: Arc<KeyedLocks>,
}

impl fmt::Debug for CatalogRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogRepository")
            .field("create_locks", &self.create_locks.len())
            .finish()
    }
}

impl CatalogRepository {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            create_locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Drops creation locks nobody holds or waits on.
    pub fn prune_locks(&self) {
        self.create_locks.prune();
    }

    pub fn lock_count(&self) -> usize {
        self.create_locks.len()
    }

    pub async fn get_by_id<D: CatalogDocument>(
        &self,
        id: D::Id,
    ) -> Result<Option<D>> {
        D::collection(&*self.store).find_by_id(id).await
    }

    pub async fn get_by_natural_key<D: CatalogDocument>(
        &self,
        natural_key: &str,
    ) -> Result<Option<D>> {
        D::collection(&*self.store)
            .find_by_natural_key(natural_key)
            .await
    }

    /// Returns the stored twin of `candidate`, inserting it when none exists.
    pub async fn create<D: CatalogDocument>(
        &self,
        candidate: D,
    ) -> Result<Resolved<D>> {
        let _guard = self
            .create_locks
            .lock(format!("{}:{}", D::COLLECTION, candidate.natural_key()))
            .await;
        let collection = D::collection(&*self.store);

        if let Some(existing) = collection
            .find_by_identity(&candidate.identity_key())
            .await?
        {
            return Ok(Resolved::Found(existing));
        }

        if let Some(existing) = collection
            .find_by_natural_key(&candidate.natural_key())
            .await?
        {
            return self.repair(existing, &candidate).await.map(Resolved::Found);
        }

        match collection.insert(&candidate).await {
            Ok(()) => {
                debug!(
                    collection = D::COLLECTION,
                    id = %candidate.id(),
                    "created catalog document"
                );
                Ok(Resolved::Created(candidate))
            }
            Err(err) if err.is_duplicate_key() => {
                warn!(
                    collection = D::COLLECTION,
                    error = %err,
                    "insert raced with another writer; retrying as update"
                );
                let existing = match collection
                    .find_by_natural_key(&candidate.natural_key())
                    .await?
                {
                    Some(doc) => Some(doc),
                    None => {
                        collection
                            .find_by_identity(&candidate.identity_key())
                            .await?
                    }
                };
                match existing {
                    Some(doc) => {
                        self.repair(doc, &candidate).await.map(Resolved::Found)
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Writes `doc` over the stored document with the same id.
    pub async fn update<D: CatalogDocument>(&self, doc: &D) -> Result<()> {
        D::collection(&*self.store).replace(doc).await
    }

    /// Stores `candidate`'s content under whichever id the catalog already
    /// uses for its natural key.
    pub async fn upsert_resolving_id<D: CatalogDocument>(
        &self,
        mut candidate: D,
    ) -> Result<Resolved<D>> {
        match self.create(candidate.clone()).await? {
            Resolved::Found(existing) => {
                candidate.adopt_identity(&existing);
                if candidate != existing {
                    self.update(&candidate).await?;
                }
                Ok(Resolved::Found(candidate))
            }
            created => Ok(created),
        }
    }

    pub async fn delete<D: CatalogDocument>(&self, ids: &[D::Id]) -> Result<u64> {
        D::collection(&*self.store).delete_many(ids).await
    }

    async fn repair<D: CatalogDocument>(
        &self,
        mut existing: D,
        candidate: &D,
    ) -> Result<D> {
        if existing.repair_ids_from(candidate) {
            debug!(
                collection = D::COLLECTION,
                id = %existing.id(),
                "repairing stale parent ids"
            );
            self.update(&existing).await?;
        }
        Ok(existing)
    }
}
