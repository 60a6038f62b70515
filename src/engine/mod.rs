//! # Secret Engine
//!
//! Wires the resolver, cache, injector and refresh controller together from
//! [`Settings`] and explicitly supplied collaborators.
//!
//! The cache store is chosen lazily: the first operation that touches the
//! cache runs the [`CacheStoreGuard`], builds the store for the backend that
//! is actually usable, and keeps it for the lifetime of the engine.
//!
//! ```rust,ignore
//! use cloudkeys::{config::JsonConfigStore, SecretEngine, Settings};
//! use std::sync::Arc;
//!
//! let config = Arc::new(JsonConfigStore::new());
//! let engine = SecretEngine::builder(Settings::load(None)?)
//!     .config_store(config.clone())
//!     .build()?;
//!
//! engine.boot().await;
//! let api_key = config.get_str("app.api_key");
//! ```

pub mod injector;
pub mod refresh;

pub use injector::{ConfigInjector, InjectionSummary};
pub use refresh::RefreshController;

use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::cache::{
    build_store, CacheBackend, CacheBackendState, CacheStore, CacheStoreGuard, MemoryCacheStore,
    SecretCache,
};
use crate::config::{ConfigStore, JsonConfigStore, Settings};
use crate::errors::Result;
use crate::secrets::{
    DiagnosticSink, HttpClient, KeyMapping, RemoteTokenReader, ReqwestHttpClient, Resolution,
    SecretResolver, TracingSink,
};
use crate::storage::{create_pool, DbPool, SchemaInspector, SqliteSchemaInspector};

/// Components that exist once the cache backend is settled.
struct CacheRuntime {
    backend: CacheBackendState,
    cache: Arc<SecretCache>,
    injector: Arc<ConfigInjector>,
    refresher: RefreshController,
}

/// Secret resolution and injection engine.
pub struct SecretEngine {
    settings: Settings,
    resolver: Arc<SecretResolver>,
    config: Arc<dyn ConfigStore>,
    diagnostics: Arc<dyn DiagnosticSink>,
    cache_store: Option<Arc<dyn CacheStore>>,
    pool: Option<DbPool>,
    inspector: Option<Arc<dyn SchemaInspector>>,
    runtime: OnceCell<CacheRuntime>,
}

impl fmt::Debug for SecretEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretEngine")
            .field("mode", self.resolver.mode())
            .field("cache_store", &self.settings.cache_store)
            .field("cache_mode", &self.settings.cache_mode)
            .field("booted", &self.runtime.initialized())
            .finish()
    }
}

impl SecretEngine {
    pub fn builder(settings: Settings) -> SecretEngineBuilder {
        SecretEngineBuilder::new(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_store(&self) -> Arc<dyn ConfigStore> {
        self.config.clone()
    }

    /// Run the cache store guard and, when `override_env` is set, inject the
    /// configured mapping. Returns `None` when injection is switched off.
    pub async fn boot(&self) -> Option<InjectionSummary> {
        if !self.settings.override_env {
            info!("override_env is disabled, leaving configuration untouched");
            return None;
        }

        let runtime = self.runtime().await;
        info!(
            configured = %runtime.backend.configured,
            active = %runtime.backend.active,
            cache = ?runtime.cache,
            "Booting secret engine"
        );
        Some(runtime.injector.inject(&self.settings.map).await)
    }

    /// Inject the configured mapping.
    pub async fn inject(&self) -> InjectionSummary {
        self.inject_mapping(&self.settings.map).await
    }

    pub async fn inject_mapping(&self, mapping: &KeyMapping) -> InjectionSummary {
        self.runtime().await.injector.inject(mapping).await
    }

    /// Evict and re-inject the configured mapping.
    pub async fn refresh(&self) -> InjectionSummary {
        self.refresh_mapping(&self.settings.map).await
    }

    pub async fn refresh_mapping(&self, mapping: &KeyMapping) -> InjectionSummary {
        self.runtime().await.refresher.refresh(mapping).await
    }

    /// Resolve every source now, bypassing the cache.
    pub async fn resolve(&self) -> Resolution {
        self.resolver.resolve_with_report().await
    }

    /// Look up one secret through the cache.
    pub async fn secret(&self, secret_key: &str) -> Option<String> {
        let runtime = self.runtime().await;
        runtime.cache.get_or_load(secret_key, || self.resolver.resolve()).await
    }

    /// Configured and active cache backend. Runs the guard if it has not run yet.
    pub async fn backend_state(&self) -> CacheBackendState {
        self.runtime().await.backend
    }

    async fn runtime(&self) -> &CacheRuntime {
        self.runtime.get_or_init(|| self.start_cache()).await
    }

    async fn start_cache(&self) -> CacheRuntime {
        let settings = &self.settings;

        let (backend, store) = match &self.cache_store {
            Some(store) => (CacheBackendState::unchecked(settings.cache_store), store.clone()),
            None => {
                let pool = self.database_pool().await;
                let inspector = self.inspector.clone().or_else(|| {
                    pool.clone()
                        .map(|pool| Arc::new(SqliteSchemaInspector::new(pool)) as Arc<dyn SchemaInspector>)
                });
                let guard =
                    CacheStoreGuard::new(inspector, &settings.cache_table, self.diagnostics.clone());
                let backend = guard.ensure_usable_backend(settings.cache_store).await;
                let store = self.open_store(backend.active, pool);
                (backend, store)
            }
        };

        let cache = Arc::new(
            SecretCache::new(store, self.diagnostics.clone())
                .with_mode(settings.cache_mode)
                .with_prefix(&settings.cache_prefix)
                .with_aggregate_key(&settings.cache_key)
                .with_ttl(settings.cache_ttl()),
        );
        let injector =
            Arc::new(ConfigInjector::new(cache.clone(), self.resolver.clone(), self.config.clone()));
        let refresher = RefreshController::new(cache.clone(), injector.clone());

        CacheRuntime { backend, cache, injector, refresher }
    }

    /// Pool for the database backend. Only opened when that backend is configured.
    async fn database_pool(&self) -> Option<DbPool> {
        if self.settings.cache_store != CacheBackend::Database {
            return None;
        }
        if let Some(pool) = &self.pool {
            return Some(pool.clone());
        }

        match create_pool(&self.settings.database).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "Cache database unavailable");
                None
            }
        }
    }

    fn open_store(&self, backend: CacheBackend, pool: Option<DbPool>) -> Arc<dyn CacheStore> {
        let settings = &self.settings;
        match build_store(backend, &settings.cache_directory(), pool, &settings.cache_table) {
            Ok(store) => store,
            Err(e) => {
                warn!(backend = %backend, error = %e, "Cache store unavailable, using in-memory store");
                Arc::new(MemoryCacheStore::new())
            }
        }
    }
}

/// Builder for [`SecretEngine`].
///
/// Every collaborator has a default: [`JsonConfigStore`] for configuration,
/// `reqwest` for HTTP, [`TracingSink`] for diagnostics, and the cache backend
/// named in the settings.
pub struct SecretEngineBuilder {
    settings: Settings,
    config: Option<Arc<dyn ConfigStore>>,
    http: Option<Arc<dyn HttpClient>>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    cache_store: Option<Arc<dyn CacheStore>>,
    pool: Option<DbPool>,
    inspector: Option<Arc<dyn SchemaInspector>>,
}

impl SecretEngineBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            config: None,
            http: None,
            diagnostics: None,
            cache_store: None,
            pool: None,
            inspector: None,
        }
    }

    pub fn config_store(mut self, config: Arc<dyn ConfigStore>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Use this store as-is. Skips the guard.
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// Database for the `database` backend instead of opening `settings.database`.
    pub fn database_pool(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn schema_inspector(mut self, inspector: Arc<dyn SchemaInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// # Errors
    ///
    /// Returns a validation error if the settings are invalid.
    pub fn build(self) -> Result<SecretEngine> {
        self.settings.validate()?;

        let diagnostics = self.diagnostics.unwrap_or_else(|| Arc::new(TracingSink));
        let http = self.http.unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let config = self.config.unwrap_or_else(|| Arc::new(JsonConfigStore::new()));

        let resolver = SecretResolver::new(
            self.settings.mode.clone(),
            self.settings.sources(),
            RemoteTokenReader::new(http, self.settings.http.retry_policy()),
            diagnostics.clone(),
        );

        Ok(SecretEngine {
            settings: self.settings,
            resolver: Arc::new(resolver),
            config,
            diagnostics,
            cache_store: self.cache_store,
            pool: self.pool,
            inspector: self.inspector,
            runtime: OnceCell::new(),
        })
    }
}
