//! In-memory arena of the whole catalog, built once per server pass.

use std::collections::HashMap;
use std::fmt;

use flatsync_model::{Episode, Movie, Season, TvShow};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::document::CatalogDocument;
use crate::database::ports::catalog::CatalogStore;
use crate::error::Result;

/// Documents of one collection indexed by id, identity key, natural key and
/// ancestor id.
pub struct Index<D: CatalogDocument> {
    by_id: HashMap<D::Id, D>,
    by_identity: HashMap<String, D::Id>,
    by_natural_key: HashMap<String, D::Id>,
    by_ancestor: HashMap<Uuid, Vec<D::Id>>,
}

impl<D: CatalogDocument> Default for Index<D> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            by_identity: HashMap::new(),
            by_natural_key: HashMap::new(),
            by_ancestor: HashMap::new(),
        }
    }
}

impl<D: CatalogDocument> fmt::Debug for Index<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("collection", &D::COLLECTION)
            .field("len", &self.by_id.len())
            .finish()
    }
}

impl<D: CatalogDocument> Index<D> {
    pub fn get(&self, id: D::Id) -> Option<&D> {
        self.by_id.get(&id)
    }

    pub fn by_identity(&self, identity_key: &str) -> Option<&D> {
        self.by_identity
            .get(identity_key)
            .and_then(|id| self.by_id.get(id))
    }

    pub fn by_natural_key(&self, natural_key: &str) -> Option<&D> {
        self.by_natural_key
            .get(natural_key)
            .and_then(|id| self.by_id.get(id))
    }

    pub fn children_of(&self, ancestor: Uuid) -> Vec<&D> {
        self.by_ancestor
            .get(&ancestor)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &D> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Inserts or replaces `doc`, relinking it under its current ancestors.
    pub fn upsert(&mut self, doc: D) {
        self.remove(doc.id());
        let id = doc.id();
        self.by_identity.insert(doc.identity_key(), id);
        // First writer keeps the natural key when duplicates were loaded.
        self.by_natural_key.entry(doc.natural_key()).or_insert(id);
        for ancestor in doc.ancestor_ids() {
            let children = self.by_ancestor.entry(ancestor).or_default();
            if !children.contains(&id) {
                children.push(id);
            }
        }
        self.by_id.insert(id, doc);
    }

    pub fn remove(&mut self, id: D::Id) -> Option<D> {
        let doc = self.by_id.remove(&id)?;
        if self.by_identity.get(&doc.identity_key()) == Some(&id) {
            self.by_identity.remove(&doc.identity_key());
        }
        if self.by_natural_key.get(&doc.natural_key()) == Some(&id) {
            self.by_natural_key.remove(&doc.natural_key());
        }
        for ancestor in doc.ancestor_ids() {
            if let Some(children) = self.by_ancestor.get_mut(&ancestor) {
                children.retain(|child| *child != id);
            }
        }
        Some(doc)
    }

    fn load(docs: Vec<D>) -> Self {
        let mut index = Self::default();
        for doc in docs {
            index.upsert(doc);
        }
        index
    }
}

#[derive(Debug, Default)]
pub struct CatalogIndex {
    pub movies: Index<Movie>,
    pub shows: Index<TvShow>,
    pub seasons: Index<Season>,
    pub episodes: Index<Episode>,
}

/// Maps a document type to its index inside [`CatalogIndex`].
pub trait Indexed: CatalogDocument {
    fn index(catalog: &CatalogIndex) -> &Index<Self>;

    fn index_mut(catalog: &mut CatalogIndex) -> &mut Index<Self>;
}

macro_rules! indexed {
    ($doc:ty, $field:ident) => {
        impl Indexed for $doc {
            fn index(catalog: &CatalogIndex) -> &Index<Self> {
                &catalog.$field
            }

            fn index_mut(catalog: &mut CatalogIndex) -> &mut Index<Self> {
                &mut catalog.$field
            }
        }
    };
}

indexed!(Movie, movies);
indexed!(TvShow, shows);
indexed!(Season, seasons);
indexed!(Episode, episodes);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCounts {
    pub movies: usize,
    pub tv_shows: usize,
    pub seasons: usize,
    pub episodes: usize,
}

/// Shared snapshot of the catalog for one pass.
///
/// Access goes through closures so no lock guard can be held across an
/// await point; callers clone what they need out of the index.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    inner: RwLock<CatalogIndex>,
}

impl CatalogSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn build(store: &dyn CatalogStore) -> Result<Self> {
        let (movies, shows, seasons, episodes) = futures::try_join!(
            store.movies().find_all(),
            store.shows().find_all(),
            store.seasons().find_all(),
            store.episodes().find_all(),
        )?;

        let index = CatalogIndex {
            movies: Index::load(movies),
            shows: Index::load(shows),
            seasons: Index::load(seasons),
            episodes: Index::load(episodes),
        };
        let snapshot = Self {
            inner: RwLock::new(index),
        };
        debug!(counts = ?snapshot.counts(), "catalog snapshot built");
        Ok(snapshot)
    }

    pub fn read<R>(&self, f: impl FnOnce(&CatalogIndex) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut CatalogIndex) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn by_identity<D: Indexed>(&self, identity_key: &str) -> Option<D> {
        self.read(|catalog| D::index(catalog).by_identity(identity_key).cloned())
    }

    pub fn by_natural_key<D: Indexed>(&self, natural_key: &str) -> Option<D> {
        self.read(|catalog| D::index(catalog).by_natural_key(natural_key).cloned())
    }

    /// Identity lookup first, natural key second.
    pub fn resolve<D: Indexed>(
        &self,
        identity_key: &str,
        natural_key: &str,
    ) -> Option<D> {
        self.read(|catalog| {
            let index = D::index(catalog);
            index
                .by_identity(identity_key)
                .or_else(|| index.by_natural_key(natural_key))
                .cloned()
        })
    }

    pub fn upsert<D: Indexed>(&self, doc: D) {
        self.write(|catalog| D::index_mut(catalog).upsert(doc));
    }

    pub fn remove<D: Indexed>(&self, id: D::Id) -> Option<D> {
        self.write(|catalog| D::index_mut(catalog).remove(id))
    }

    pub fn children_of<D: Indexed>(&self, ancestor: Uuid) -> Vec<D> {
        self.read(|catalog| {
            D::index(catalog)
                .children_of(ancestor)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    pub fn all<D: Indexed>(&self) -> Vec<D> {
        self.read(|catalog| D::index(catalog).iter().cloned().collect())
    }

    pub fn counts(&self) -> CatalogCounts {
        self.read(|catalog| CatalogCounts {
            movies: catalog.movies.len(),
            tv_shows: catalog.shows.len(),
            seasons: catalog.seasons.len(),
            episodes: catalog.episodes.len(),
        })
    }
}
