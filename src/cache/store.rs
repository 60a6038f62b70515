//! Cache store abstraction.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Result;
use crate::secrets::SecretSet;

/// Value held by a cache store entry.
///
/// Per-key caching stores a single (possibly absent) secret value; aggregate
/// caching stores the whole resolved set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CachedValue {
    Secret(Option<String>),
    SecretSet(SecretSet),
}

/// Key/value store with per-entry TTL.
///
/// Implementations are expected to make `get`, `put` and `forget` atomic per
/// key. An expired entry must read as absent.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<CachedValue>>;

    async fn put(&self, key: &str, value: CachedValue, ttl: Duration) -> Result<()>;

    /// Remove an entry. Returns whether one was present.
    async fn forget(&self, key: &str) -> Result<bool>;

    /// Return the cached value or run `loader`, store its result and return it.
    async fn remember(
        &self,
        key: &str,
        ttl: Duration,
        loader: BoxFuture<'_, CachedValue>,
    ) -> Result<CachedValue> {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = loader.await;
        self.put(key, value.clone(), ttl).await?;
        Ok(value)
    }
}
