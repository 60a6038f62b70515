//! Config injector.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::cache::SecretCache;
use crate::config::ConfigStore;
use crate::secrets::{KeyMapping, SecretResolver, SecretSet};

/// What one injection pass wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionSummary {
    /// Configuration keys that received a value.
    pub written: Vec<String>,
    /// Configuration keys set to null because the secret was not found.
    pub unset: Vec<String>,
}

impl InjectionSummary {
    pub fn total(&self) -> usize {
        self.written.len() + self.unset.len()
    }
}

/// Writes mapped secrets into the host configuration store.
pub struct ConfigInjector {
    cache: Arc<SecretCache>,
    resolver: Arc<SecretResolver>,
    config: Arc<dyn ConfigStore>,
}

impl std::fmt::Debug for ConfigInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigInjector")
            .field("cache", &self.cache)
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl ConfigInjector {
    pub fn new(
        cache: Arc<SecretCache>,
        resolver: Arc<SecretResolver>,
        config: Arc<dyn ConfigStore>,
    ) -> Self {
        Self { cache, resolver, config }
    }

    /// Resolve every mapped secret through the cache and write it (or null)
    /// under its configuration key. Never fails.
    ///
    /// Cache misses within one call share a single resolver pass.
    pub async fn inject(&self, mapping: &KeyMapping) -> InjectionSummary {
        let resolution: OnceCell<SecretSet> = OnceCell::new();
        let mut summary = InjectionSummary::default();

        for entry in mapping.iter() {
            let value = self
                .cache
                .get_or_load(&entry.secret, || async {
                    resolution.get_or_init(|| self.resolver.resolve()).await.clone()
                })
                .await;

            debug!(config_key = %entry.config, secret_key = %entry.secret, found = value.is_some(), "Injecting secret");
            match value {
                Some(_) => summary.written.push(entry.config.clone()),
                None => summary.unset.push(entry.config.clone()),
            }
            self.config.set(&entry.config, value);
        }

        info!(
            written = summary.written.len(),
            unset = summary.unset.len(),
            resolved = resolution.initialized(),
            "Secrets injected into configuration"
        );
        summary
    }
}
