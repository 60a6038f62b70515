//! # Configuration Management
//!
//! [`Settings`] configures the engine; [`ConfigStore`] is the host
//! configuration the engine writes secrets into.

pub mod settings;
pub mod store;

pub use settings::{
    DatabaseSettings, HttpSettings, Settings, DEFAULT_VAULT_PATH, DEFAULT_VAULT_URL, ENV_PREFIX,
    MAX_CACHE_TTL_SECS,
};
pub use store::{ConfigStore, JsonConfigStore};
