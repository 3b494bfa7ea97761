//! Repository ports (interfaces) for the catalog store and its satellites.
//! In-memory adapters live in `database::memory`; the Postgres and Redis
//! adapters sit behind the `database` feature.

pub mod cache_invalidation;
pub mod catalog;
pub mod content_hashes;
