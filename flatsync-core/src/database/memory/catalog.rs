use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use flatsync_model::{Episode, Movie, Season, TvShow};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::catalog::document::CatalogDocument;
use crate::database::ports::catalog::{CatalogStore, DocumentCollection};
use crate::error::{Result, SyncError};

struct CollectionState<D: CatalogDocument> {
    docs: HashMap<D::Id, D>,
    identities: HashMap<String, D::Id>,
}

impl<D: CatalogDocument> Default for CollectionState<D> {
    fn default() -> Self {
        Self {
            docs: HashMap::new(),
            identities: HashMap::new(),
        }
    }
}

/// Collection with the same unique-identity guarantee as the Postgres table.
pub struct InMemoryCollection<D: CatalogDocument> {
    state: Arc<Mutex<CollectionState<D>>>,
    writes: AtomicU64,
}

impl<D: CatalogDocument> Default for InMemoryCollection<D> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(CollectionState::default())),
            writes: AtomicU64::new(0),
        }
    }
}

impl<D: CatalogDocument> fmt::Debug for InMemoryCollection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryCollection")
            .field("collection", &D::COLLECTION)
            .field("writes", &self.write_count())
            .finish()
    }
}

impl<D: CatalogDocument> InMemoryCollection<D> {
    /// Inserts, replaces and deletes performed so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.docs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<D: CatalogDocument> DocumentCollection<D> for InMemoryCollection<D> {
    async fn find_by_id(&self, id: D::Id) -> Result<Option<D>> {
        let guard = self.state.lock().await;
        Ok(guard.docs.get(&id).cloned())
    }

    async fn find_by_identity(&self, identity_key: &str) -> Result<Option<D>> {
        let guard = self.state.lock().await;
        Ok(guard
            .identities
            .get(identity_key)
            .and_then(|id| guard.docs.get(id))
            .cloned())
    }

    async fn find_by_natural_key(&self, natural_key: &str) -> Result<Option<D>> {
        let guard = self.state.lock().await;
        let mut matches: Vec<&D> = guard
            .docs
            .values()
            .filter(|doc| doc.natural_key() == natural_key)
            .collect();
        // Oldest record wins when duplicates already exist.
        matches.sort_by_key(|doc| -> Uuid { doc.id().into() });
        Ok(matches.first().map(|doc| (*doc).clone()))
    }

    async fn find_by_ancestor(&self, ancestor: Uuid) -> Result<Vec<D>> {
        let guard = self.state.lock().await;
        Ok(guard
            .docs
            .values()
            .filter(|doc| doc.ancestor_ids().contains(&ancestor))
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<D>> {
        let guard = self.state.lock().await;
        Ok(guard.docs.values().cloned().collect())
    }

    async fn insert(&self, doc: &D) -> Result<()> {
        let mut guard = self.state.lock().await;
        let identity = doc.identity_key();
        if guard.identities.contains_key(&identity)
            || guard.docs.contains_key(&doc.id())
        {
            return Err(SyncError::DuplicateKey {
                collection: D::COLLECTION,
                key: identity,
            });
        }
        guard.identities.insert(identity, doc.id());
        guard.docs.insert(doc.id(), doc.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn replace(&self, doc: &D) -> Result<()> {
        let mut guard = self.state.lock().await;
        let identity = doc.identity_key();
        if guard
            .identities
            .get(&identity)
            .is_some_and(|owner| *owner != doc.id())
        {
            return Err(SyncError::DuplicateKey {
                collection: D::COLLECTION,
                key: identity,
            });
        }
        let previous = guard
            .docs
            .get(&doc.id())
            .map(CatalogDocument::identity_key)
            .ok_or_else(|| {
                SyncError::NotFound(format!("{} {}", D::COLLECTION, doc.id()))
            })?;
        guard.identities.remove(&previous);
        guard.identities.insert(identity, doc.id());
        guard.docs.insert(doc.id(), doc.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete_many(&self, ids: &[D::Id]) -> Result<u64> {
        let mut guard = self.state.lock().await;
        let mut removed = 0;
        for id in ids {
            if let Some(doc) = guard.docs.remove(id) {
                guard.identities.remove(&doc.identity_key());
                removed += 1;
            }
        }
        if removed > 0 {
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    pub movies: InMemoryCollection<Movie>,
    pub shows: InMemoryCollection<TvShow>,
    pub seasons: InMemoryCollection<Season>,
    pub episodes: InMemoryCollection<Episode>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total writes across all four collections.
    pub fn write_count(&self) -> u64 {
        self.movies.write_count()
            + self.shows.write_count()
            + self.seasons.write_count()
            + self.episodes.write_count()
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn movies(&self) -> &dyn DocumentCollection<Movie> {
        &self.movies
    }

    fn shows(&self) -> &dyn DocumentCollection<TvShow> {
        &self.shows
    }

    fn seasons(&self) -> &dyn DocumentCollection<Season> {
        &self.seasons
    }

    fn episodes(&self) -> &dyn DocumentCollection<Episode> {
        &self.episodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatsync_model::CatalogTitle;

    #[tokio::test]
    async fn insert_rejects_taken_identity() {
        let store = InMemoryCatalogStore::new();
        let first = TvShow::new(CatalogTitle::new("Show Y").unwrap());
        let second = TvShow::new(CatalogTitle::new("Show Y").unwrap());

        store.shows().insert(&first).await.unwrap();
        let err = store.shows().insert(&second).await.unwrap_err();

        assert!(err.is_duplicate_key());
        assert_eq!(store.shows.len().await, 1);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn replace_moves_identity_with_the_document() {
        let store = InMemoryCatalogStore::new();
        let show = TvShow::new(CatalogTitle::new("Show Y").unwrap());
        let other = TvShow::new(CatalogTitle::new("Show Z").unwrap());
        let mut season = Season::new(&show, 1);
        store.seasons().insert(&season).await.unwrap();

        let stale_identity = season.identity_key();
        season.show_id = other.id;
        store.seasons().replace(&season).await.unwrap();

        assert!(
            store
                .seasons()
                .find_by_identity(&stale_identity)
                .await
                .unwrap()
                .is_none()
        );
        let found = store
            .seasons()
            .find_by_ancestor(other.id.to_uuid())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
