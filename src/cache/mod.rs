//! # Secret Caching
//!
//! [`SecretCache`] sits between the config injector and the resolver. It
//! stores resolved secrets in a pluggable [`CacheStore`]:
//!
//! - [`MemoryCacheStore`]: in-process map
//! - [`FileCacheStore`]: one JSON file per entry under a cache directory
//! - [`DatabaseCacheStore`]: rows in a SQLite cache table
//!
//! [`CacheStoreGuard`] runs at boot and swaps a `database` backend for the
//! `file` backend when the cache table is missing.

pub mod database;
pub mod file;
pub mod guard;
pub mod memory;
pub mod secret_cache;
pub mod store;

pub use database::DatabaseCacheStore;
pub use file::FileCacheStore;
pub use guard::{CacheBackend, CacheBackendState, CacheStoreGuard, BACKEND_DOWNGRADED};
pub use memory::MemoryCacheStore;
pub use secret_cache::{
    CacheMode, SecretCache, DEFAULT_AGGREGATE_KEY, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_TTL,
};
pub use store::{CacheStore, CachedValue};

use std::path::Path;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::storage::DbPool;

/// Build the store for the backend the guard selected.
///
/// # Errors
///
/// Fails only for `database` without a pool, which the guard never selects.
pub fn build_store(
    backend: CacheBackend,
    cache_dir: &Path,
    pool: Option<DbPool>,
    table: &str,
) -> Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match backend {
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
        CacheBackend::File => Arc::new(FileCacheStore::new(cache_dir)),
        CacheBackend::Database => {
            let pool = pool
                .ok_or_else(|| Error::cache("database cache store requires a database pool"))?;
            Arc::new(DatabaseCacheStore::new(pool, table)?)
        }
    };
    Ok(store)
}
