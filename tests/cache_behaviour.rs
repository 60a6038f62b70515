//! Cache hits, expiry, persistence and granularity through the engine.

mod common;

use std::path::PathBuf;
use std::time::Duration;

use cloudkeys::cache::{CacheBackend, CacheMode};
use cloudkeys::config::MAX_CACHE_TTL_SECS;
use cloudkeys::secrets::RemoteTokenSource;
use cloudkeys::{ResolutionMode, Settings};
use common::{mount_secret, TestEnv, TEST_TOKEN};
use wiremock::MockServer;

fn file_settings(env: &TestEnv) -> Settings {
    Settings {
        mode: ResolutionMode::File,
        file_paths: vec![PathBuf::from("a.env")],
        map: [("app.api_key", "API_KEY")].into_iter().collect(),
        ..env.settings()
    }
}

#[tokio::test]
async fn test_second_lookup_within_ttl_does_not_refetch() {
    let server = MockServer::start().await;
    mount_secret(&server, "/v1/secret/data/app", &[("DB_PASS", "xyz")]).await;

    let env = TestEnv::new();
    let engine = env.engine(Settings {
        mode: ResolutionMode::Token,
        token_sources: vec![RemoteTokenSource::new(TEST_TOKEN, "/v1/secret/data/app", server.uri())],
        ..env.settings()
    });

    assert_eq!(engine.secret("DB_PASS").await.as_deref(), Some("xyz"));
    assert_eq!(engine.secret("DB_PASS").await.as_deref(), Some("xyz"));

    let requests = server.received_requests().await.expect("request recording enabled");
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_file_cache_survives_a_new_engine() {
    let env = TestEnv::new();
    let source = env.write("a.env", "API_KEY=abc123\n");
    let settings = Settings { cache_store: CacheBackend::File, ..file_settings(&env) };

    env.engine(settings.clone()).boot().await;
    std::fs::remove_file(source).unwrap();

    // New engine, same cache directory: the source is gone but the entry is not.
    let engine = env.engine(settings);
    assert_eq!(engine.secret("API_KEY").await.as_deref(), Some("abc123"));
    assert_eq!(engine.backend_state().await.active, CacheBackend::File);
    assert!(env.dir.path().join(".cloudkeys/cache").is_dir());
}

#[tokio::test]
async fn test_expired_file_entry_triggers_fresh_resolution() {
    let env = TestEnv::new();
    let source = env.write("a.env", "API_KEY=first\n");
    let engine = env.engine(Settings {
        cache_store: CacheBackend::File,
        cache_ttl: 1,
        ..file_settings(&env)
    });

    assert_eq!(engine.secret("API_KEY").await.as_deref(), Some("first"));

    std::fs::write(&source, "API_KEY=second\n").unwrap();
    assert_eq!(engine.secret("API_KEY").await.as_deref(), Some("first"));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(engine.secret("API_KEY").await.as_deref(), Some("second"));
}

#[tokio::test]
async fn test_aggregate_mode_resolves_once_for_all_keys() {
    let server = MockServer::start().await;
    mount_secret(&server, "/v1/secret/data/app", &[("API_KEY", "abc123"), ("DB_PASS", "xyz")])
        .await;

    let env = TestEnv::new();
    let engine = env.engine(Settings {
        mode: ResolutionMode::Token,
        cache_mode: CacheMode::Aggregate,
        cache_store: CacheBackend::File,
        token_sources: vec![RemoteTokenSource::new(TEST_TOKEN, "/v1/secret/data/app", server.uri())],
        map: [("app.api_key", "API_KEY"), ("db.pass", "DB_PASS")].into_iter().collect(),
        ..env.settings()
    });

    engine.boot().await;
    engine.inject().await;
    assert_eq!(engine.secret("DB_PASS").await.as_deref(), Some("xyz"));

    assert_eq!(env.config_str("app.api_key").as_deref(), Some("abc123"));
    assert_eq!(env.config_str("db.pass").as_deref(), Some("xyz"));
    let requests = server.received_requests().await.expect("request recording enabled");
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_cold_per_key_injection_resolves_once() {
    let server = MockServer::start().await;
    mount_secret(&server, "/v1/secret/data/app", &[("API_KEY", "abc123"), ("DB_PASS", "xyz")])
        .await;

    let env = TestEnv::new();
    let engine = env.engine(Settings {
        mode: ResolutionMode::Token,
        token_sources: vec![RemoteTokenSource::new(TEST_TOKEN, "/v1/secret/data/app", server.uri())],
        map: [("app.api_key", "API_KEY"), ("db.pass", "DB_PASS"), ("x.y", "NOPE")]
            .into_iter()
            .collect(),
        ..env.settings()
    });

    engine.boot().await;

    let requests = server.received_requests().await.expect("request recording enabled");
    assert_eq!(requests.len(), 1);
    assert_eq!(env.config_str("db.pass").as_deref(), Some("xyz"));
}

#[tokio::test]
async fn test_longest_allowed_ttl_boots_on_every_local_store() {
    for cache_store in [CacheBackend::Memory, CacheBackend::File] {
        let env = TestEnv::new();
        env.write("a.env", "API_KEY=abc123\n");
        let settings = Settings { cache_store, cache_ttl: MAX_CACHE_TTL_SECS, ..file_settings(&env) };

        let engine = env.engine(settings);
        let summary = engine.boot().await.expect("override_env is on");

        assert_eq!(summary.written, vec!["app.api_key".to_string()], "{}", cache_store);
        assert_eq!(engine.secret("API_KEY").await.as_deref(), Some("abc123"));
    }
}

#[tokio::test]
async fn test_unbounded_ttl_is_rejected_at_build() {
    let env = TestEnv::new();
    let settings = Settings { cache_ttl: u64::MAX, ..file_settings(&env) };

    let result = cloudkeys::SecretEngine::builder(settings).build();
    assert!(result.is_err());
}
