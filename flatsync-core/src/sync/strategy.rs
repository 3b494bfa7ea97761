use flatsync_model::{HashManifest, ServerConfig};
use tokio::time::timeout;
use tracing::{info, warn};

use super::report::StrategyKind;
use super::settings::SyncSettings;
use crate::remote::{HASHES_PATH, RemoteServerClient};

/// How a pass decides whether metadata needs re-checking.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStrategy {
    /// Metadata checks may be skipped where the server's declared hash
    /// matches the stored one.
    HashBased(HashManifest),
    /// Every field of every entity is compared.
    Traditional,
}

impl SyncStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            SyncStrategy::HashBased(_) => StrategyKind::HashBased,
            SyncStrategy::Traditional => StrategyKind::Traditional,
        }
    }

    pub fn manifest(&self) -> Option<&HashManifest> {
        match self {
            SyncStrategy::HashBased(manifest) => Some(manifest),
            SyncStrategy::Traditional => None,
        }
    }
}

/// Probes the hash endpoint and loads the manifest. Any failure falls back
/// to the traditional strategy.
pub async fn detect_strategy(
    client: &dyn RemoteServerClient,
    server: &ServerConfig,
    settings: &SyncSettings,
) -> SyncStrategy {
    if !settings.hash_based {
        return SyncStrategy::Traditional;
    }

    let available = timeout(settings.probe_timeout, client.probe(server, HASHES_PATH))
        .await
        .unwrap_or(false);
    if !available {
        info!(server = %server.id, "hash endpoint unavailable; using traditional sync");
        return SyncStrategy::Traditional;
    }

    match timeout(server.timeout, client.fetch_json(server, HASHES_PATH)).await {
        Ok(Ok(body)) => match serde_json::from_value::<HashManifest>(body) {
            Ok(manifest) => {
                info!(
                    server = %server.id,
                    movies = manifest.movies.len(),
                    shows = manifest.tv.len(),
                    "using hash-based sync"
                );
                SyncStrategy::HashBased(manifest)
            }
            Err(err) => {
                warn!(server = %server.id, error = %err, "malformed hash manifest");
                SyncStrategy::Traditional
            }
        },
        Ok(Err(err)) => {
            warn!(server = %server.id, error = %err, "hash manifest fetch failed");
            SyncStrategy::Traditional
        }
        Err(_) => {
            warn!(server = %server.id, "hash manifest fetch timed out");
            SyncStrategy::Traditional
        }
    }
}
