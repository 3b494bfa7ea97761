use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use flatsync_model::{Episode, Movie, Season, TvShow};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use super::map_insert_error;
use crate::catalog::document::CatalogDocument;
use crate::database::ports::catalog::{CatalogStore, DocumentCollection};
use crate::error::{Result, SyncError};

/// One collection stored as rows of `catalog_documents`.
pub struct PostgresCollection<D> {
    pool: PgPool,
    _doc: PhantomData<fn() -> D>,
}

impl<D: CatalogDocument> fmt::Debug for PostgresCollection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCollection")
            .field("collection", &D::COLLECTION)
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl<D: CatalogDocument> PostgresCollection<D> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _doc: PhantomData,
        }
    }

    fn decode(row: &sqlx::postgres::PgRow) -> Result<D> {
        let body: serde_json::Value = row.try_get("document")?;
        Ok(serde_json::from_value(body)?)
    }

    async fn fetch_one_where(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<D>> {
        let sql = format!(
            "SELECT document FROM catalog_documents \
             WHERE collection = $1 AND {column} = $2 \
             ORDER BY created_at ASC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(D::COLLECTION)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode).transpose()
    }
}

#[async_trait]
impl<D: CatalogDocument> DocumentCollection<D> for PostgresCollection<D> {
    async fn find_by_id(&self, id: D::Id) -> Result<Option<D>> {
        let id: Uuid = id.into();
        let row = sqlx::query(
            "SELECT document FROM catalog_documents \
             WHERE collection = $1 AND id = $2",
        )
        .bind(D::COLLECTION)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn find_by_identity(&self, identity_key: &str) -> Result<Option<D>> {
        self.fetch_one_where("identity_key", identity_key).await
    }

    async fn find_by_natural_key(&self, natural_key: &str) -> Result<Option<D>> {
        self.fetch_one_where("natural_key", natural_key).await
    }

    async fn find_by_ancestor(&self, ancestor: Uuid) -> Result<Vec<D>> {
        let rows = sqlx::query(
            "SELECT document FROM catalog_documents \
             WHERE collection = $1 AND $2 = ANY(ancestors)",
        )
        .bind(D::COLLECTION)
        .bind(ancestor)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::decode).collect()
    }

    async fn find_all(&self) -> Result<Vec<D>> {
        let rows = sqlx::query(
            "SELECT document FROM catalog_documents WHERE collection = $1",
        )
        .bind(D::COLLECTION)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::decode).collect()
    }

    async fn insert(&self, doc: &D) -> Result<()> {
        let id: Uuid = doc.id().into();
        let identity = doc.identity_key();
        let body = serde_json::to_value(doc)?;
        sqlx::query(
            "INSERT INTO catalog_documents \
             (collection, id, identity_key, natural_key, ancestors, document) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(D::COLLECTION)
        .bind(id)
        .bind(&identity)
        .bind(doc.natural_key())
        .bind(doc.ancestor_ids())
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, D::COLLECTION, &identity))?;
        debug!(collection = D::COLLECTION, %id, "inserted catalog document");
        Ok(())
    }

    async fn replace(&self, doc: &D) -> Result<()> {
        let id: Uuid = doc.id().into();
        let identity = doc.identity_key();
        let body = serde_json::to_value(doc)?;
        let result = sqlx::query(
            "UPDATE catalog_documents \
             SET identity_key = $3, natural_key = $4, ancestors = $5, \
                 document = $6, updated_at = NOW() \
             WHERE collection = $1 AND id = $2",
        )
        .bind(D::COLLECTION)
        .bind(id)
        .bind(&identity)
        .bind(doc.natural_key())
        .bind(doc.ancestor_ids())
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, D::COLLECTION, &identity))?;

        if result.rows_affected() == 0 {
            return Err(SyncError::NotFound(format!(
                "{} {}",
                D::COLLECTION,
                id
            )));
        }
        Ok(())
    }

    async fn delete_many(&self, ids: &[D::Id]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| (*id).into()).collect();
        let result = sqlx::query(
            "DELETE FROM catalog_documents \
             WHERE collection = $1 AND id = ANY($2)",
        )
        .bind(D::COLLECTION)
        .bind(&ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug)]
pub struct PostgresCatalogStore {
    movies: PostgresCollection<Movie>,
    shows: PostgresCollection<TvShow>,
    seasons: PostgresCollection<Season>,
    episodes: PostgresCollection<Episode>,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            movies: PostgresCollection::new(pool.clone()),
            shows: PostgresCollection::new(pool.clone()),
            seasons: PostgresCollection::new(pool.clone()),
            episodes: PostgresCollection::new(pool),
        }
    }
}

impl CatalogStore for PostgresCatalogStore {
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
