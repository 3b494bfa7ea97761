//! File-server access: the client port, its reqwest adapter and the
//! per-pass fetch memo.

#[cfg(feature = "http")]
mod http;
mod memo;

#[cfg(feature = "http")]
pub use http::HttpRemoteClient;
pub use memo::{FetchCounters, PassFetcher};

use std::fmt;

use async_trait::async_trait;
use flatsync_model::{MediaType, ServerConfig};
use serde::Serialize;

use crate::Result;

/// Full data tree of one file server.
pub const CATALOG_PATH: &str = "/api/catalog";

/// Optional content-hash manifest; its presence enables hash-based sync.
pub const HASHES_PATH: &str = "/api/hashes";

/// Blurhash resolution endpoint.
pub const BLURHASH_PATH: &str = "/api/blurhash";

/// Image role a blurhash reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BlurhashKind {
    Poster,
    Backdrop,
    SeasonPoster,
    Thumbnail,
}

impl BlurhashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlurhashKind::Poster => "poster",
            BlurhashKind::Backdrop => "backdrop",
            BlurhashKind::SeasonPoster => "seasonPoster",
            BlurhashKind::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for BlurhashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait RemoteServerClient: Send + Sync {
    /// True when `path` answers successfully; never errors.
    async fn probe(&self, server: &ServerConfig, path: &str) -> bool;

    /// Fetches a JSON document; relative paths resolve against the server.
    async fn fetch_json(
        &self,
        server: &ServerConfig,
        path: &str,
    ) -> Result<serde_json::Value>;

    /// Resolves a blurhash reference to the blurhash string.
    async fn fetch_blurhash(
        &self,
        server: &ServerConfig,
        reference: &str,
        kind: BlurhashKind,
        media_type: MediaType,
        title: &str,
    ) -> Result<String>;
}
