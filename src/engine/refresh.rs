//! Refresh controller: evict, then re-inject.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::injector::{ConfigInjector, InjectionSummary};
use crate::cache::SecretCache;
use crate::secrets::KeyMapping;

/// Serializes refreshes so overlapping calls do not evict and refetch twice
/// at the same time.
#[derive(Debug)]
pub struct RefreshController {
    cache: Arc<SecretCache>,
    injector: Arc<ConfigInjector>,
    lock: Mutex<()>,
}

impl RefreshController {
    pub fn new(cache: Arc<SecretCache>, injector: Arc<ConfigInjector>) -> Self {
        Self { cache, injector, lock: Mutex::new(()) }
    }

    /// Evict the cache entries of every secret key in `mapping` and inject
    /// again, forcing a fresh resolution.
    pub async fn refresh(&self, mapping: &KeyMapping) -> InjectionSummary {
        let _guard = self.lock.lock().await;

        let evicted = self.cache.evict(mapping.secret_keys()).await;
        info!(evicted, mapped_keys = mapping.len(), mode = ?self.cache.mode(), "Refreshing secrets");

        self.injector.inject(mapping).await
    }
}
