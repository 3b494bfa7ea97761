//! Postgres adapters for the catalog and content hash ports.

mod catalog;
mod content_hashes;

pub use catalog::{PostgresCatalogStore, PostgresCollection};
pub use content_hashes::PostgresContentHashStore;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::error::{Result, SyncError};

/// Maps unique violations (SQLSTATE 23505) to `DuplicateKey`.
pub(crate) fn map_insert_error(
    err: sqlx::Error,
    collection: &'static str,
    key: &str,
) -> SyncError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code().map(|c| c.to_string());
        if code.as_deref() == Some("23505") {
            return SyncError::DuplicateKey {
                collection,
                key: key.to_string(),
            };
        }
    }
    SyncError::Database(err)
}

/// Connects and runs the bundled migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to catalog database");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    crate::MIGRATOR.run(&pool).await.map_err(|e| {
        SyncError::Storage(format!("Migration failed: {e}"))
    })?;

    Ok(pool)
}
