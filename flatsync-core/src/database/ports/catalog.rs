use async_trait::async_trait;
use flatsync_model::{Episode, Movie, Season, TvShow};
use uuid::Uuid;

use crate::Result;
use crate::catalog::document::CatalogDocument;

/// One flat collection of catalog documents.
#[async_trait]
pub trait DocumentCollection<D: CatalogDocument>: Send + Sync {
    async fn find_by_id(&self, id: D::Id) -> Result<Option<D>>;

    async fn find_by_identity(&self, identity_key: &str) -> Result<Option<D>>;

    async fn find_by_natural_key(&self, natural_key: &str) -> Result<Option<D>>;

    /// Documents listing `ancestor` among their parent ids.
    async fn find_by_ancestor(&self, ancestor: Uuid) -> Result<Vec<D>>;

    async fn find_all(&self) -> Result<Vec<D>>;

    /// Fails with `SyncError::DuplicateKey` when the identity key is taken.
    async fn insert(&self, doc: &D) -> Result<()>;

    /// Overwrites the document with the same id.
    async fn replace(&self, doc: &D) -> Result<()>;

    async fn delete_many(&self, ids: &[D::Id]) -> Result<u64>;
}

pub trait CatalogStore: Send + Sync {
    fn movies(&self) -> &dyn DocumentCollection<Movie>;

    fn shows(&self) -> &dyn DocumentCollection<TvShow>;

    fn seasons(&self) -> &dyn DocumentCollection<Season>;

    fn episodes(&self) -> &dyn DocumentCollection<Episode>;
}
