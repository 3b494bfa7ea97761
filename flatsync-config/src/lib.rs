//! Configuration for flatsync runs.
//!
//! A run is described by an optional TOML file (`flatsync.toml`) layered
//! under process environment variables, after an optional `.env` file has
//! been loaded. [`ConfigLoader`] composes both into a validated [`Config`]
//! plus non-fatal [`ConfigWarnings`].

#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod sources;
pub mod telemetry;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader};
pub use models::{
    Config, ConfigMetadata, DatabaseConfig, RedisConfig, SyncConfig,
};
pub use sources::{EnvConfig, FileConfig, FileServerEntry, FileSyncConfig};
pub use validation::{ConfigWarning, ConfigWarnings};
