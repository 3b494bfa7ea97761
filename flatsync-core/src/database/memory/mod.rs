//! In-memory adapters used by tests and dry runs.

mod catalog;
mod content_hashes;

pub use catalog::{InMemoryCatalogStore, InMemoryCollection};
pub use content_hashes::InMemoryContentHashStore;
