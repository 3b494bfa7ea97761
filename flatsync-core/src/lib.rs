//! # flatsync core
//!
//! Reconciles the flat catalogs published by several media file servers
//! into one deduplicated movie / TV catalog.
//!
//! ## Overview
//!
//! - **Sync passes**: [`sync::SyncEngine`] runs one server's tree through
//!   movie, show, season and episode phases, writing only the fields the
//!   server is allowed to own.
//! - **Arbitration**: [`availability`] decides per field whether a server
//!   is authoritative, may fill a gap, or must leave the value alone.
//! - **Deduplication**: [`catalog::CatalogRepository`] guarantees one
//!   document per natural key, even under concurrent creates.
//! - **Hash gating**: content hashes recorded per server let unchanged
//!   metadata skip its fetch.
//! - **Reaping**: [`reaper::AvailabilityReaper`] removes what no server
//!   offers any more.
//!
//! ## Feature Flags
//!
//! - `database`: Postgres catalog + hash stores, Redis cache invalidation
//! - `http`: reqwest-backed [`remote::RemoteServerClient`]

#![allow(missing_docs)]

/// Field-level arbitration between servers
pub mod availability;

/// Catalog documents, repository, snapshot and key locks
pub mod catalog;

/// Storage ports and their in-memory / Postgres / Redis adapters
pub mod database;

/// Full-run orchestration across all configured servers
pub mod driver;

pub mod error;

pub mod notify;

/// Removal of entities no server offers
pub mod reaper;

/// File-server client port and per-pass fetch memo
pub mod remote;

/// Per-server sync passes
pub mod sync;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use availability::{
    Arbitration, FieldAvailabilityBuilder, FieldAvailabilityIndex,
};
pub use catalog::{CatalogRepository, CatalogSnapshot, Resolved};
pub use driver::{DriverReport, ServerOutcome, SyncDriver};
pub use error::{Result, SyncError};
pub use notify::{DeliveryCounts, NoopNotificationSink, NotificationSink};
pub use reaper::{AvailabilityReaper, ReapReport, RemovedCounts};
pub use remote::RemoteServerClient;
#[cfg(feature = "http")]
pub use remote::HttpRemoteClient;
pub use sync::{SyncEngine, SyncReport, SyncSettings};
