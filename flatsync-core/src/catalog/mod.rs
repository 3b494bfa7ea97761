//! Catalog persistence helpers: document shapes, the deduplicating
//! repository, the per-pass in-memory snapshot and per-key locks.

pub mod document;
pub mod locks;
pub mod repository;
pub mod snapshot;

pub use document::CatalogDocument;
pub use locks::KeyedLocks;
pub use repository::{CatalogRepository, Resolved};
pub use snapshot::{
    CatalogCounts, CatalogIndex, CatalogSnapshot, Index, Indexed,
};
