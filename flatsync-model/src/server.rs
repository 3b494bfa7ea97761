use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, Result};

/// Identifier of a configured file server (e.g. `"server1"`).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        ServerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServerId {
    fn from(value: &str) -> Self {
        ServerId(value.to_string())
    }
}

impl AsRef<str> for ServerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection settings for one file server.
///
/// `priority` is a static rank: lower numbers win arbitration ties when a
/// field-availability ranking is derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub id: ServerId,
    pub priority: u32,
    pub base_url: String,
    pub timeout: Duration,
}

impl ServerConfig {
    pub fn new(
        id: impl Into<String>,
        priority: u32,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: ServerId::new(id),
            priority,
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Checks the fields a sync pass cannot start without.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(ModelError::InvalidServerConfig(
                "server id is required".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(ModelError::InvalidServerConfig(format!(
                "server {} is missing a base url",
                self.id
            )));
        }
        Url::parse(&self.base_url).map_err(|err| {
            ModelError::InvalidServerConfig(format!(
                "server {} has an invalid base url {:?}: {err}",
                self.id, self.base_url
            ))
        })?;
        if self.timeout.is_zero() {
            return Err(ModelError::InvalidServerConfig(format!(
                "server {} has a zero timeout",
                self.id
            )));
        }
        Ok(())
    }

    /// Resolves a server-relative path against `base_url`. Absolute URLs are
    /// returned unchanged.
    pub fn resolve_url(&self, raw: &str) -> String {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return raw.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            raw.trim_start_matches('/')
        )
    }
}

/// Canonical form of a video URL used to match watch history across servers:
/// the lowercased path without scheme, host or query.
pub fn normalize_video_id(video_url: &str) -> String {
    let path = match Url::parse(video_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => video_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.trim_start_matches('/').to_lowercase()
}
