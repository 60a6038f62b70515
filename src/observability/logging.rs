//! # Structured Logging
//!
//! `tracing-subscriber` setup. `RUST_LOG` takes precedence over the level
//! passed in; JSON output is opt-in.

use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::errors::{Error, Result};

/// Build the log filter: `RUST_LOG` if set and valid, otherwise `level`.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::config(format!("Invalid log level '{}': {}", level, e)))
}

/// Install the global subscriber. Installing twice is a no-op.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = env_filter(level)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
    } else {
        tracing::subscriber::set_global_default(builder.finish()).is_ok()
    };

    if !installed {
        // Subscriber already set elsewhere (e.g. integration tests); ignore.
        tracing::debug!("Global tracing subscriber already installed");
    }
    Ok(())
}

/// Log a summary of the active settings. Tokens are never logged.
pub fn log_settings_info(settings: &Settings) {
    tracing::info!(
        mode = %settings.mode,
        file_sources = settings.secret_files().len(),
        remote_sources = settings.remote_sources().len(),
        override_env = settings.override_env,
        cache_store = %settings.cache_store,
        cache_mode = ?settings.cache_mode,
        cache_ttl_secs = settings.cache_ttl,
        mapped_keys = settings.map.len(),
        "cloudkeys configuration"
    );
}
