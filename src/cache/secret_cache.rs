//! TTL cache for resolved secrets.
//!
//! Two granularities:
//!
//! - **per-key** (default): each secret key is cached under
//!   `{prefix}{secret_key}`, e.g. `vault.secret.DB_PASS`. A key missing from
//!   every source is cached as `None` for the TTL and reported once per fresh
//!   resolution.
//! - **aggregate**: the whole resolved [`SecretSet`] is cached under a single
//!   key (`CLOUD_KEYS` by default).
//!
//! Concurrent misses for the same cache key are coalesced: one caller runs the
//! loader while the others wait for it and then read the stored entry.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::store::{CacheStore, CachedValue};
use crate::secrets::{Diagnostic, DiagnosticSink, SecretSet, SourceError};

pub const DEFAULT_CACHE_PREFIX: &str = "vault.secret.";
pub const DEFAULT_AGGREGATE_KEY: &str = "CLOUD_KEYS";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Caching granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    #[default]
    PerKey,
    Aggregate,
}

pub struct SecretCache {
    store: Arc<dyn CacheStore>,
    mode: CacheMode,
    prefix: String,
    aggregate_key: String,
    ttl: Duration,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for SecretCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCache")
            .field("store", &self.store.name())
            .field("mode", &self.mode)
            .field("prefix", &self.prefix)
            .field("aggregate_key", &self.aggregate_key)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SecretCache {
    pub fn new(store: Arc<dyn CacheStore>, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            store,
            mode: CacheMode::default(),
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            aggregate_key: DEFAULT_AGGREGATE_KEY.to_string(),
            ttl: DEFAULT_CACHE_TTL,
            in_flight: DashMap::new(),
            diagnostics,
        }
    }

    pub fn with_mode(mut self, mode: CacheMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_aggregate_key(mut self, key: impl Into<String>) -> Self {
        self.aggregate_key = key.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Per-key cache key for a secret key.
    pub fn cache_key(&self, secret_key: &str) -> String {
        format!("{}{}", self.prefix, secret_key)
    }

    /// Cache entry that holds `secret_key` in the current mode.
    pub fn entry_key(&self, secret_key: &str) -> String {
        match self.mode {
            CacheMode::PerKey => self.cache_key(secret_key),
            CacheMode::Aggregate => self.aggregate_key.clone(),
        }
    }

    /// Return the cached value for `secret_key`, or run `loader` (a full
    /// resolution), cache the outcome and return it.
    ///
    /// `None` means the key is absent from every source.
    pub async fn get_or_load<F, Fut>(&self, secret_key: &str, loader: F) -> Option<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SecretSet>,
    {
        match self.mode {
            CacheMode::PerKey => {
                let key = self.cache_key(secret_key);
                let extract = |cached: CachedValue| match cached {
                    CachedValue::Secret(value) => Some(value),
                    CachedValue::SecretSet(_) => None,
                };
                let load = move || async move {
                    let secrets = loader().await;
                    let value = secrets.get(secret_key).map(str::to_string);
                    if value.is_none() {
                        self.report_missing(secret_key);
                    }
                    (CachedValue::Secret(value.clone()), value)
                };
                self.cached_or_load(&key, extract, load).await
            }
            CacheMode::Aggregate => {
                let (secrets, fresh) = self.aggregate_or_load(loader).await;
                let value = secrets.get(secret_key).map(str::to_string);
                if value.is_none() && fresh {
                    self.report_missing(secret_key);
                }
                value
            }
        }
    }

    /// Evict the entry for one secret key. In aggregate mode this evicts the
    /// whole set.
    pub async fn forget(&self, secret_key: &str) -> bool {
        let key = self.entry_key(secret_key);
        self.forget_entry(&key).await
    }

    /// Evict the entries for the given secret keys. Returns how many store
    /// entries were actually removed.
    pub async fn evict<'a>(&self, secret_keys: impl IntoIterator<Item = &'a str>) -> usize {
        match self.mode {
            CacheMode::PerKey => {
                let mut removed = 0;
                for secret_key in secret_keys {
                    if self.forget_entry(&self.cache_key(secret_key)).await {
                        removed += 1;
                    }
                }
                removed
            }
            CacheMode::Aggregate => {
                let key = self.aggregate_key.clone();
                usize::from(self.forget_entry(&key).await)
            }
        }
    }

    async fn aggregate_or_load<F, Fut>(&self, loader: F) -> (SecretSet, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SecretSet>,
    {
        let key = self.aggregate_key.clone();
        let extract = |cached: CachedValue| match cached {
            CachedValue::SecretSet(secrets) => Some((secrets, false)),
            CachedValue::Secret(_) => None,
        };
        let load = move || async move {
            let secrets = loader().await;
            (CachedValue::SecretSet(secrets.clone()), (secrets, true))
        };
        self.cached_or_load(&key, extract, load).await
    }

    /// Single-flight read-through for one store key.
    async fn cached_or_load<T, C, F, Fut>(&self, key: &str, extract: C, load: F) -> T
    where
        C: Fn(CachedValue) -> Option<T>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = (CachedValue, T)>,
    {
        if let Some(value) = self.read(key).await.and_then(&extract) {
            debug!(key = %key, "Cache hit");
            return value;
        }

        let lock = self.in_flight.entry(key.to_string()).or_default().value().clone();
        let value = {
            let _guard = lock.lock().await;

            // Another caller may have filled the entry while we waited.
            match self.read(key).await.and_then(&extract) {
                Some(value) => {
                    debug!(key = %key, "Cache filled by concurrent load");
                    value
                }
                None => {
                    debug!(key = %key, ttl_secs = self.ttl.as_secs(), "Cache miss, loading");
                    let (cached, value) = load().await;
                    self.write(key, cached).await;
                    value
                }
            }
        };

        // Map entry plus our clone: nobody else is waiting on this key.
        self.in_flight.remove_if(key, |_, entry| Arc::strong_count(entry) <= 2);
        value
    }

    async fn read(&self, key: &str) -> Option<CachedValue> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, store = self.store.name(), error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: CachedValue) {
        if let Err(e) = self.store.put(key, value, self.ttl).await {
            warn!(key = %key, store = self.store.name(), error = %e, "Cache write failed");
        }
    }

    async fn forget_entry(&self, key: &str) -> bool {
        match self.store.forget(key).await {
            Ok(removed) => {
                debug!(key = %key, removed, "Evicted cache entry");
                removed
            }
            Err(e) => {
                warn!(key = %key, store = self.store.name(), error = %e, "Cache eviction failed");
                false
            }
        }
    }

    fn report_missing(&self, secret_key: &str) {
        self.diagnostics.emit(Diagnostic::from_error(SourceError::secret_not_found(secret_key)));
    }
}
