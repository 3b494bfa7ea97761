use async_trait::async_trait;
use flatsync_model::{HashKey, ServerId};

use crate::Result;

/// Per-server content hashes at movie, show, season and episode level.
#[async_trait]
pub trait ContentHashStore: Send + Sync {
    /// Upserts the hash for `(key, server)`.
    async fn store(&self, key: &HashKey, hash: &str, server: &ServerId)
    -> Result<()>;

    /// `Ok(None)` on a miss.
    async fn get(&self, key: &HashKey, server: &ServerId)
    -> Result<Option<String>>;
}
