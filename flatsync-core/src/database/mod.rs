pub mod memory;
pub mod ports;

#[cfg(feature = "database")]
pub mod cache;
#[cfg(feature = "database")]
pub mod infrastructure;

#[cfg(feature = "database")]
pub use cache::RedisCacheInvalidator;
#[cfg(feature = "database")]
pub use infrastructure::postgres::{
    PostgresCatalogStore, PostgresContentHashStore,
};
pub use memory::{InMemoryCatalogStore, InMemoryContentHashStore};
pub use ports::cache_invalidation::{
    CacheInvalidator, CacheKeys, NoopCacheInvalidator,
};
pub use ports::catalog::{CatalogStore, DocumentCollection};
pub use ports::content_hashes::ContentHashStore;
