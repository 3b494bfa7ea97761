use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use flatsync_model::{MediaType, ServerConfig};
use reqwest::Client;
use tracing::{debug, warn};

use super::{BLURHASH_PATH, BlurhashKind, RemoteServerClient};
use crate::error::{Result, SyncError};

/// reqwest-backed file server client. Each call is bounded by the server's
/// own timeout; probes use the shorter probe timeout.
#[derive(Clone)]
pub struct HttpRemoteClient {
    client: Client,
    probe_timeout: Duration,
}

impl fmt::Debug for HttpRemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRemoteClient")
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl HttpRemoteClient {
    pub fn new(probe_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("flatsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            probe_timeout,
        })
    }

    fn map_error(server: &ServerConfig, path: &str, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout {
                server: server.id.clone(),
                path: path.to_string(),
            }
        } else {
            SyncError::Http(err)
        }
    }
}

#[async_trait]
impl RemoteServerClient for HttpRemoteClient {
    async fn probe(&self, server: &ServerConfig, path: &str) -> bool {
        let url = server.resolve_url(path);
        match self
            .client
            .head(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(server = %server.id, %url, error = %err, "probe failed");
                false
            }
        }
    }

    async fn fetch_json(
        &self,
        server: &ServerConfig,
        path: &str,
    ) -> Result<serde_json::Value> {
        let url = server.resolve_url(path);
        debug!(server = %server.id, %url, "fetching json");
        let response = self
            .client
            .get(&url)
            .timeout(server.timeout)
            .send()
            .await
            .map_err(|e| Self::map_error(server, path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::remote(
                &server.id,
                format!("GET {url} returned {status}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Self::map_error(server, path, e))
    }

    async fn fetch_blurhash(
        &self,
        server: &ServerConfig,
        reference: &str,
        kind: BlurhashKind,
        media_type: MediaType,
        title: &str,
    ) -> Result<String> {
        let url = server.resolve_url(BLURHASH_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("ref", reference),
                ("kind", kind.as_str()),
                ("mediaType", media_type.as_str()),
                ("title", title),
            ])
            .timeout(server.timeout)
            .send()
            .await
            .map_err(|e| Self::map_error(server, BLURHASH_PATH, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(server = %server.id, %kind, title, "blurhash lookup returned {}", status);
            return Err(SyncError::remote(
                &server.id,
                format!("blurhash lookup returned {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::map_error(server, BLURHASH_PATH, e))?;
        let blurhash = body.trim();
        if blurhash.is_empty() {
            return Err(SyncError::remote(&server.id, "empty blurhash response"));
        }
        Ok(blurhash.to_string())
    }
}
