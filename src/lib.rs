//! # cloudkeys
//!
//! Resolves secrets from local files or a Vault KV v2 endpoint, caches them
//! with a TTL, and injects selected secrets into an application's runtime
//! configuration.
//!
//! ## Architecture
//!
//! ```text
//! boot → Cache Store Guard → Config Injector → Secret Cache → Secret Resolver → Source Readers
//!                                   ↓                               ↓
//!                             ConfigStore                 file (.env / JSON) | Vault (token)
//! ```
//!
//! ## Core Components
//!
//! - **Source readers** ([`secrets::FileReader`], [`secrets::RemoteTokenReader`]):
//!   one source in, a [`secrets::SecretSet`] or a [`secrets::SourceError`] out
//! - **Secret resolver** ([`secrets::SecretResolver`]): reads the sources of
//!   the active mode and merges them, later sources winning
//! - **Secret cache** ([`cache::SecretCache`]): per-key or aggregate TTL cache
//!   with single-flight loading over a memory, file or SQLite store
//! - **Cache store guard** ([`cache::CacheStoreGuard`]): falls back from the
//!   database store to the file store when the cache table is missing
//! - **Config injector / refresh controller** ([`engine`]): write mapped
//!   secrets into a [`config::ConfigStore`], evict and re-inject on refresh
//!
//! Source failures never propagate: they become diagnostics and the affected
//! configuration keys are set to null.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cloudkeys::{config::JsonConfigStore, Result, SecretEngine, Settings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Arc::new(JsonConfigStore::new());
//!     let engine = SecretEngine::builder(Settings::load(None)?)
//!         .config_store(config.clone())
//!         .build()?;
//!
//!     engine.boot().await;
//!     println!("{:?}", config.get_str("app.api_key"));
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod observability;
pub mod secrets;
pub mod storage;

// Re-export commonly used types and traits
pub use config::{ConfigStore, Settings};
pub use engine::{InjectionSummary, SecretEngine, SecretEngineBuilder};
pub use errors::{Error, Result};
pub use secrets::{KeyMapping, ResolutionMode, SecretSet, SourceError};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
