use async_trait::async_trait;
use flatsync_model::{HashKey, ServerId};
use sqlx::{PgPool, Row};

use crate::Result;
use crate::database::ports::content_hashes::ContentHashStore;

#[derive(Clone, Debug)]
pub struct PostgresContentHashStore {
    pool: PgPool,
}

impl PostgresContentHashStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn key_columns(key: &HashKey) -> (&'static str, String, i32, i32) {
    let level = |n: Option<u32>| {
        n.and_then(|n| i32::try_from(n).ok()).unwrap_or(-1)
    };
    (
        key.media_type.as_str(),
        key.title.clone().unwrap_or_default(),
        level(key.season_number),
        level(key.episode_number),
    )
}

#[async_trait]
impl ContentHashStore for PostgresContentHashStore {
    async fn store(
        &self,
        key: &HashKey,
        hash: &str,
        server: &ServerId,
    ) -> Result<()> {
        let (media_type, title, season, episode) = key_columns(key);
        sqlx::query(
            "INSERT INTO content_hashes \
             (media_type, title, season_number, episode_number, server_id, hash) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (media_type, title, season_number, episode_number, server_id) \
             DO UPDATE SET hash = EXCLUDED.hash, updated_at = NOW()",
        )
        .bind(media_type)
        .bind(title)
        .bind(season)
        .bind(episode)
        .bind(server.as_str())
        .bind(hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(
        &self,
        key: &HashKey,
        server: &ServerId,
    ) -> Result<Option<String>> {
        let (media_type, title, season, episode) = key_columns(key);
        let row = sqlx::query(
            "SELECT hash FROM content_hashes \
             WHERE media_type = $1 AND title = $2 AND season_number = $3 \
               AND episode_number = $4 AND server_id = $5",
        )
        .bind(media_type)
        .bind(title)
        .bind(season)
        .bind(episode)
        .bind(server.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.try_get::<String, _>("hash")).transpose()?)
    }
}
