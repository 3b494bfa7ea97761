use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use flatsync_model::{MediaType, Metadata, ServerConfig};
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio::time::timeout;

use super::{BlurhashKind, RemoteServerClient};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchCounters {
    pub metadata_fetches: u64,
    pub blurhash_fetches: u64,
    pub memo_hits: u64,
}

/// Remote access for a single server pass.
///
/// Metadata documents are memoized by path and blurhashes by
/// `(reference, kind)`, so a payload shared by many entities is fetched once
/// per pass. Concurrent callers for the same key wait on one in-flight fetch;
/// failures are not memoized.
pub struct PassFetcher {
    client: Arc<dyn RemoteServerClient>,
    server: ServerConfig,
    metadata: DashMap<String, Arc<OnceCell<Metadata>>>,
    blurhashes: DashMap<(String, BlurhashKind), Arc<OnceCell<String>>>,
    metadata_fetches: AtomicU64,
    blurhash_fetches: AtomicU64,
    memo_hits: AtomicU64,
}

impl fmt::Debug for PassFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassFetcher")
            .field("server", &self.server.id)
            .field("counters", &self.counters())
            .finish()
    }
}

impl PassFetcher {
    pub fn new(client: Arc<dyn RemoteServerClient>, server: ServerConfig) -> Self {
        Self {
            client,
            server,
            metadata: DashMap::new(),
            blurhashes: DashMap::new(),
            metadata_fetches: AtomicU64::new(0),
            blurhash_fetches: AtomicU64::new(0),
            memo_hits: AtomicU64::new(0),
        }
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub async fn metadata(&self, path: &str) -> Result<Metadata> {
        let cell = self
            .metadata
            .entry(path.to_string())
            .or_default()
            .clone();
        if let Some(hit) = cell.get() {
            self.memo_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.clone());
        }

        let value = cell
            .get_or_try_init(|| async {
                self.metadata_fetches.fetch_add(1, Ordering::Relaxed);
                let fetch = self.client.fetch_json(&self.server, path);
                match timeout(self.server.timeout, fetch).await {
                    Ok(result) => result.map(Metadata::new),
                    Err(_) => Err(SyncError::Timeout {
                        server: self.server.id.clone(),
                        path: path.to_string(),
                    }),
                }
            })
            .await?;
        Ok(value.clone())
    }

    pub async fn blurhash(
        &self,
        reference: &str,
        kind: BlurhashKind,
        media_type: MediaType,
        title: &str,
    ) -> Result<String> {
        let cell = self
            .blurhashes
            .entry((reference.to_string(), kind))
            .or_default()
            .clone();
        if let Some(hit) = cell.get() {
            self.memo_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.clone());
        }

        let value = cell
            .get_or_try_init(|| async {
                self.blurhash_fetches.fetch_add(1, Ordering::Relaxed);
                let fetch = self.client.fetch_blurhash(
                    &self.server,
                    reference,
                    kind,
                    media_type,
                    title,
                );
                match timeout(self.server.timeout, fetch).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Timeout {
                        server: self.server.id.clone(),
                        path: reference.to_string(),
                    }),
                }
            })
            .await?;
        Ok(value.clone())
    }

    pub fn counters(&self) -> FetchCounters {
        FetchCounters {
            metadata_fetches: self.metadata_fetches.load(Ordering::Relaxed),
            blurhash_fetches: self.blurhash_fetches.load(Ordering::Relaxed),
            memo_hits: self.memo_hits.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingClient {
        json_calls: AtomicUsize,
        blurhash_calls: AtomicUsize,
        fail_first_json: bool,
    }

    #[async_trait]
    impl RemoteServerClient for CountingClient {
        async fn probe(&self, _server: &ServerConfig, _path: &str) -> bool {
            false
        }

        async fn fetch_json(
            &self,
            server: &ServerConfig,
            path: &str,
        ) -> Result<serde_json::Value> {
            let call = self.json_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first_json && call == 0 {
                return Err(SyncError::remote(&server.id, "503"));
            }
            Ok(serde_json::json!({ "path": path }))
        }

        async fn fetch_blurhash(
            &self,
            _server: &ServerConfig,
            reference: &str,
            kind: BlurhashKind,
            _media_type: MediaType,
            _title: &str,
        ) -> Result<String> {
            self.blurhash_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{kind}:{reference}"))
        }
    }

    fn server() -> ServerConfig {
        ServerConfig::new("server1", 1, "http://server1.local", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn metadata_is_fetched_once_per_path() {
        let client = Arc::new(CountingClient::default());
        let fetcher = PassFetcher::new(client.clone(), server());

        let (a, b) = tokio::join!(
            fetcher.metadata("/tv/show-y/metadata.json"),
            fetcher.metadata("/tv/show-y/metadata.json")
        );
        assert_eq!(a.unwrap(), b.unwrap());
        fetcher.metadata("/movies/alpha/metadata.json").await.unwrap();

        assert_eq!(client.json_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.counters().metadata_fetches, 2);
    }

    #[tokio::test]
    async fn blurhash_memo_is_keyed_by_reference_and_kind() {
        let client = Arc::new(CountingClient::default());
        let fetcher = PassFetcher::new(client.clone(), server());

        let poster = fetcher
            .blurhash("abc", BlurhashKind::Poster, MediaType::Movie, "Alpha")
            .await
            .unwrap();
        let again = fetcher
            .blurhash("abc", BlurhashKind::Poster, MediaType::Movie, "Alpha")
            .await
            .unwrap();
        let backdrop = fetcher
            .blurhash("abc", BlurhashKind::Backdrop, MediaType::Movie, "Alpha")
            .await
            .unwrap();

        assert_eq!(poster, again);
        assert_eq!(backdrop, "backdrop:abc");
        assert_eq!(client.blurhash_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.counters().memo_hits, 1);
    }

    #[tokio::test]
    async fn failures_are_not_memoized() {
        let client = Arc::new(CountingClient {
            fail_first_json: true,
            ..CountingClient::default()
        });
        let fetcher = PassFetcher::new(client.clone(), server());

        assert!(fetcher.metadata("/m.json").await.is_err());
        assert!(fetcher.metadata("/m.json").await.is_ok());
        assert_eq!(client.json_calls.load(Ordering::SeqCst), 2);
    }
}
