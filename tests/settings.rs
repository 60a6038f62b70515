//! Layered settings loading: defaults, settings file, environment.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use cloudkeys::cache::{CacheBackend, CacheMode};
use cloudkeys::{ResolutionMode, Settings};
use tempfile::TempDir;

// Environment variables are process-global; serialize every test that loads.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const SETTINGS_TOML: &str = r#"
mode = "token"
cache_mode = "aggregate"
cache_store = "database"
cache_ttl = 900

[database]
url = "sqlite://./cache.db"

[[token_sources]]
token = "hvs.shared"
path = "/v1/secret/data/shared"
url = "https://vault.internal:8200"

[[token_sources]]
token = "hvs.app"
path = "/v1/secret/data/app"
url = "https://vault.internal:8200"

[[map]]
config = "services.mailgun.secret"
secret = "MAILGUN_SECRET"

[[map]]
config = "db.pass"
secret = "DB_PASS"
"#;

fn write_settings(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("cloudkeys.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("CLOUDKEYS_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn test_defaults_without_file() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_env();

    let settings = Settings::load(None).unwrap();

    assert_eq!(settings.mode, ResolutionMode::File);
    assert_eq!(settings.cache_store, CacheBackend::File);
    assert_eq!(settings.cache_mode, CacheMode::PerKey);
    assert_eq!(settings.cache_ttl(), Duration::from_secs(3600));
    assert!(settings.override_env);
    assert!(settings.map.is_empty());
}

#[test]
fn test_settings_file_is_loaded() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS_TOML);

    let settings = Settings::load(Some(&path)).unwrap();

    assert_eq!(settings.mode, ResolutionMode::Token);
    assert_eq!(settings.cache_mode, CacheMode::Aggregate);
    assert_eq!(settings.cache_store, CacheBackend::Database);
    assert_eq!(settings.cache_ttl, 900);
    assert_eq!(settings.database.url, "sqlite://./cache.db");
    assert_eq!(settings.database.max_connections, 5);

    let sources = settings.remote_sources();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[1].token.expose_secret(), "hvs.app");
    assert_eq!(sources[1].effective_url(), "https://vault.internal:8200/v1/secret/data/app");

    let mapped: Vec<_> = settings.map.iter().map(|e| (e.config.as_str(), e.secret.as_str())).collect();
    assert_eq!(mapped, vec![("services.mailgun.secret", "MAILGUN_SECRET"), ("db.pass", "DB_PASS")]);
}

#[test]
fn test_environment_overrides_file() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, SETTINGS_TOML);

    std::env::set_var("CLOUDKEYS_CACHE_TTL", "60");
    std::env::set_var("CLOUDKEYS_OVERRIDE_ENV", "false");
    std::env::set_var("CLOUDKEYS_DATABASE__URL", "sqlite://./other.db");
    let result = Settings::load(Some(&path));
    clear_env();

    let settings = result.unwrap();
    assert_eq!(settings.cache_ttl, 60);
    assert!(!settings.override_env);
    assert_eq!(settings.database.url, "sqlite://./other.db");
    assert_eq!(settings.mode, ResolutionMode::Token);
}

#[test]
fn test_invalid_values_are_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = TempDir::new().unwrap();

    let path = write_settings(&dir, "cache_ttl = 0\n");
    assert!(Settings::load(Some(&path)).is_err());

    let path = write_settings(&dir, "cache_key = \"vault.secret.all\"\n");
    assert!(Settings::load(Some(&path)).is_err());

    let path = write_settings(&dir, "cache_table = \"cache; DROP TABLE x\"\n");
    assert!(Settings::load(Some(&path)).is_err());
}

#[test]
fn test_missing_settings_file_is_an_error() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = TempDir::new().unwrap();

    let result = Settings::load(Some(&dir.path().join("absent.toml")));
    assert!(result.is_err());
}

#[test]
fn test_legacy_single_source_keys() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_settings(
        &dir,
        "mode = \"token\"\ntoken = \"hvs.legacy\"\nvault_url = \"https://vault:8200/\"\nvault_path = \"/v1/secret/data/legacy\"\n",
    );

    let settings = Settings::load(Some(&path)).unwrap();
    let sources = settings.remote_sources();

    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].effective_url(), "https://vault:8200/v1/secret/data/legacy");
    assert!(!format!("{:?}", settings).contains("hvs.legacy"));
}
