use flatsync_model::{ModelError, ServerId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote error from {server}: {message}")]
    Remote { server: ServerId, message: String },

    #[error("Request to {server} timed out: {path}")]
    Timeout { server: ServerId, path: String },

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey {
        collection: &'static str,
        key: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid server config: {0}")]
    InvalidConfig(String),

    #[error("Invalid catalog data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn remote(server: &ServerId, message: impl Into<String>) -> Self {
        SyncError::Remote {
            server: server.clone(),
            message: message.into(),
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, SyncError::DuplicateKey { .. })
    }
}

impl From<ModelError> for SyncError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidServerConfig(msg) => SyncError::InvalidConfig(msg),
            other => SyncError::InvalidData(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
