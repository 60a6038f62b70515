//! In-process cache store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::store::{CacheStore, CachedValue};
use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    expires_at: Instant,
}

/// HashMap-backed store with manual TTL checking.
///
/// Uses tokio's clock so expiry follows paused/advanced time in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    inner: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.inner.read().await.values().filter(|entry| entry.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove expired entries.
    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        let mut cache = self.inner.write().await;
        cache.retain(|key, entry| {
            let expired = entry.expires_at <= now;
            if expired {
                debug!(key = %key, "Removing expired cache entry");
            }
            !expired
        });
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedValue>> {
        let cache = self.inner.read().await;
        match cache.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                debug!(key = %key, "Cache entry expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: CachedValue, ttl: Duration) -> Result<()> {
        let expires_at =
            Instant::now().checked_add(ttl).ok_or_else(|| Error::cache("TTL out of range"))?;
        let entry = CacheEntry { value, expires_at };
        self.inner.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool> {
        Ok(self.inner.write().await.remove(key).is_some())
    }
}
