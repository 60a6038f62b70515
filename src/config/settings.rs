//! # Configuration Settings
//!
//! Everything the engine needs to know: which sources to read, how to cache,
//! and which configuration keys to populate.
//!
//! Settings are layered with the `config` crate:
//!
//! 1. built-in defaults
//! 2. an optional settings file (TOML, YAML or JSON by extension)
//! 3. `CLOUDKEYS_*` environment variables, `__` separating nested keys
//!    (`CLOUDKEYS_CACHE_TTL=600`, `CLOUDKEYS_DATABASE__URL=sqlite://cache.db`)

use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

use crate::cache::{
    CacheBackend, CacheMode, DEFAULT_AGGREGATE_KEY, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_TTL,
};
use crate::errors::{Error, Result};
use crate::secrets::{
    KeyMapping, RemoteTokenSource, ResolutionMode, RetryPolicy, SecretFile, SecretString,
    SourceDescriptor,
};
use crate::storage::validate_table_name;

/// Environment variable prefix for settings overrides.
pub const ENV_PREFIX: &str = "CLOUDKEYS";

/// Upper bound for `cache_ttl`: ten years.
pub const MAX_CACHE_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

pub const DEFAULT_VAULT_URL: &str = "http://127.0.0.1:8200";
pub const DEFAULT_VAULT_PATH: &str = "/v1/secret/data/your-path";

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    /// Which kind of source to read.
    pub mode: ResolutionMode,

    /// Files read in order in file mode. Relative paths resolve against
    /// [`Settings::base_path`].
    pub file_paths: Vec<PathBuf>,

    /// Remote sources read in order in token mode.
    pub token_sources: Vec<RemoteTokenSource>,

    /// Whether boot-time injection runs at all.
    pub override_env: bool,

    /// Cache key for the whole secret set in aggregate mode.
    #[validate(length(min = 1, message = "Cache key cannot be empty"))]
    pub cache_key: String,

    /// Prefix of per-key cache entries.
    #[validate(length(min = 1, message = "Cache prefix cannot be empty"))]
    pub cache_prefix: String,

    /// TTL of every cache entry, in seconds.
    #[validate(range(
        min = 1,
        max = MAX_CACHE_TTL_SECS,
        message = "Cache TTL must be between 1 second and 10 years"
    ))]
    pub cache_ttl: u64,

    pub cache_mode: CacheMode,

    /// Configured cache backend; the guard may downgrade `database` to `file`.
    pub cache_store: CacheBackend,

    /// Directory of the file cache store. Relative paths resolve against
    /// [`Settings::base_path`].
    pub cache_dir: PathBuf,

    /// Table used by the database cache store.
    pub cache_table: String,

    #[validate(nested)]
    pub database: DatabaseSettings,

    #[validate(nested)]
    pub http: HttpSettings,

    /// Configuration key to secret key mapping.
    pub map: KeyMapping,

    /// Single-source token, used when `token_sources` is empty.
    pub token: Option<SecretString>,

    /// Single-source Vault base URL.
    pub vault_url: String,

    /// Single-source Vault API path.
    pub vault_path: String,

    /// Single-source secret file, used when `file_paths` is empty.
    pub file_path: PathBuf,

    /// Base directory for relative paths. Defaults to the working directory.
    pub base_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: ResolutionMode::File,
            file_paths: Vec::new(),
            token_sources: Vec::new(),
            override_env: true,
            cache_key: DEFAULT_AGGREGATE_KEY.to_string(),
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL.as_secs(),
            cache_mode: CacheMode::PerKey,
            cache_store: CacheBackend::File,
            cache_dir: PathBuf::from(".cloudkeys/cache"),
            cache_table: "cache".to_string(),
            database: DatabaseSettings::default(),
            http: HttpSettings::default(),
            map: KeyMapping::default(),
            token: None,
            vault_url: DEFAULT_VAULT_URL.to_string(),
            vault_path: DEFAULT_VAULT_PATH.to_string(),
            file_path: PathBuf::from(".env"),
            base_path: None,
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        tracing::debug!(
            mode = %settings.mode,
            cache_store = %settings.cache_store,
            cache_mode = ?settings.cache_mode,
            mapped_keys = settings.map.len(),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        validate_table_name(&self.cache_table)?;

        if self.cache_key.starts_with(&self.cache_prefix) {
            return Err(Error::validation_field(
                "Cache key must not start with the per-key cache prefix",
                "cache_key",
            ));
        }

        Ok(())
    }

    /// Base directory for relative paths.
    pub fn base_dir(&self) -> PathBuf {
        match &self.base_path {
            Some(path) => path.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// File sources in read order, falling back to the single `file_path`.
    pub fn secret_files(&self) -> Vec<SecretFile> {
        let base = self.base_dir();
        if self.file_paths.is_empty() {
            vec![SecretFile::resolve(&self.file_path, &base)]
        } else {
            self.file_paths.iter().map(|path| SecretFile::resolve(path, &base)).collect()
        }
    }

    /// Remote sources in read order, falling back to a single source built
    /// from `token`, `vault_path` and `vault_url`.
    pub fn remote_sources(&self) -> Vec<RemoteTokenSource> {
        if !self.token_sources.is_empty() {
            return self.token_sources.clone();
        }

        match &self.token {
            Some(token) if !token.is_empty() => vec![RemoteTokenSource {
                token: token.clone(),
                path: self.vault_path.clone(),
                url: self.vault_url.clone(),
            }],
            _ => Vec::new(),
        }
    }

    /// Sources of the active mode, in read order.
    pub fn sources(&self) -> Vec<SourceDescriptor> {
        match &self.mode {
            ResolutionMode::File => self.secret_files().into_iter().map(Into::into).collect(),
            ResolutionMode::Token => self.remote_sources().into_iter().map(Into::into).collect(),
            ResolutionMode::Unsupported(_) => Vec::new(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn cache_directory(&self) -> PathBuf {
        if self.cache_dir.is_absolute() {
            self.cache_dir.clone()
        } else {
            self.base_dir().join(&self.cache_dir)
        }
    }
}

/// Database used by the `database` cache backend.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://./cloudkeys.db".to_string(),
            max_connections: 5,
            connect_timeout_seconds: 5,
        }
    }
}

impl DatabaseSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Remote fetch timeout and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HttpSettings {
    #[validate(range(
        min = 1,
        max = 300,
        message = "Request timeout must be between 1 and 300 seconds"
    ))]
    pub timeout_seconds: u64,

    #[validate(range(min = 1, max = 10, message = "Max attempts must be between 1 and 10"))]
    pub max_attempts: u32,

    #[validate(range(max = 60000, message = "Retry delay must be at most 60000 ms"))]
    pub retry_delay_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            timeout_seconds: policy.timeout.as_secs(),
            max_attempts: policy.max_attempts,
            retry_delay_ms: policy.delay.as_millis() as u64,
        }
    }
}

impl HttpSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
            timeout: Duration::from_secs(self.timeout_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.mode, ResolutionMode::File);
        assert!(settings.override_env);
        assert_eq!(settings.cache_key, "CLOUD_KEYS");
        assert_eq!(settings.cache_prefix, "vault.secret.");
        assert_eq!(settings.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(settings.http.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_validation_errors() {
        let settings = Settings { cache_ttl: 0, ..Default::default() };
        assert!(settings.validate().is_err());

        let settings = Settings { cache_prefix: String::new(), ..Default::default() };
        assert!(settings.validate().is_err());

        let settings = Settings { cache_table: "cache-table".to_string(), ..Default::default() };
        assert!(settings.validate().is_err());

        let settings = Settings {
            http: HttpSettings { max_attempts: 0, ..Default::default() },
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_cache_ttl_upper_bound() {
        let settings = Settings { cache_ttl: MAX_CACHE_TTL_SECS, ..Default::default() };
        assert!(settings.validate().is_ok());

        let settings = Settings { cache_ttl: MAX_CACHE_TTL_SECS + 1, ..Default::default() };
        assert!(settings.validate().is_err());

        let settings = Settings { cache_ttl: u64::MAX, ..Default::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_cache_key_must_not_collide_with_prefix() {
        let settings = Settings { cache_key: "vault.secret.ALL".to_string(), ..Default::default() };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("prefix"));
    }

    #[test]
    fn test_secret_files_fall_back_to_file_path() {
        let settings = Settings { base_path: Some(PathBuf::from("/srv/app")), ..Default::default() };
        let files = settings.secret_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("/srv/app/.env"));

        let settings = Settings {
            base_path: Some(PathBuf::from("/srv/app")),
            file_paths: vec![PathBuf::from("a.env"), PathBuf::from("/etc/b.json")],
            ..Default::default()
        };
        let paths: Vec<_> = settings.secret_files().into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec![PathBuf::from("/srv/app/a.env"), PathBuf::from("/etc/b.json")]);
    }

    #[test]
    fn test_sources_follow_active_mode() {
        let settings = Settings {
            base_path: Some(PathBuf::from("/srv/app")),
            token: Some(SecretString::new("hvs.x")),
            ..Default::default()
        };
        let names: Vec<_> = settings.sources().iter().map(SourceDescriptor::name).collect();
        assert_eq!(names, vec!["/srv/app/.env".to_string()]);

        let settings = Settings { mode: ResolutionMode::Token, ..settings };
        let sources = settings.sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].mode(), ResolutionMode::Token);
        assert_eq!(sources[0].name(), "/v1/secret/data/your-path");

        let settings = Settings { mode: ResolutionMode::from("ldap"), ..settings };
        assert!(settings.sources().is_empty());
    }

    #[test]
    fn test_remote_sources_legacy_synthesis() {
        let settings = Settings::default();
        assert!(settings.remote_sources().is_empty());

        let settings = Settings { token: Some(SecretString::new("hvs.x")), ..Default::default() };
        let sources = settings.remote_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].effective_url(), "http://127.0.0.1:8200/v1/secret/data/your-path");

        let settings = Settings {
            token: Some(SecretString::new("ignored")),
            token_sources: vec![
                RemoteTokenSource::new("a", "/v1/secret/data/one", "http://vault"),
                RemoteTokenSource::new("b", "/v1/secret/data/two", "http://vault"),
            ],
            ..Default::default()
        };
        assert_eq!(settings.remote_sources().len(), 2);
    }

    #[test]
    fn test_cache_directory_resolution() {
        let settings = Settings { base_path: Some(PathBuf::from("/srv/app")), ..Default::default() };
        assert_eq!(settings.cache_directory(), PathBuf::from("/srv/app/.cloudkeys/cache"));

        let settings = Settings { cache_dir: PathBuf::from("/var/cache/ck"), ..Default::default() };
        assert_eq!(settings.cache_directory(), PathBuf::from("/var/cache/ck"));
    }

    #[test]
    fn test_serialized_settings_redact_tokens() {
        let settings = Settings {
            token: Some(SecretString::new("hvs.secret")),
            token_sources: vec![RemoteTokenSource::new("hvs.other", "/v1/x", "http://vault")],
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("hvs.secret"));
        assert!(!json.contains("hvs.other"));
    }
}
