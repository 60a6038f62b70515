//! Cache store guard behaviour when the database backend is configured.

mod common;

use std::path::PathBuf;

use cloudkeys::cache::{CacheBackend, BACKEND_DOWNGRADED};
use cloudkeys::config::DatabaseSettings;
use cloudkeys::storage::{create_cache_table, create_pool};
use cloudkeys::{ResolutionMode, Settings};
use common::TestEnv;

fn database_settings(env: &TestEnv, url: String) -> Settings {
    env.write("a.env", "API_KEY=abc123\n");
    Settings {
        mode: ResolutionMode::File,
        file_paths: vec![PathBuf::from("a.env")],
        cache_store: CacheBackend::Database,
        database: DatabaseSettings { url, connect_timeout_seconds: 1, ..Default::default() },
        map: [("app.api_key", "API_KEY")].into_iter().collect(),
        ..env.settings()
    }
}

fn sqlite_url(env: &TestEnv) -> String {
    format!("sqlite://{}", env.dir.path().join("cache.db").display())
}

#[tokio::test]
async fn test_missing_cache_table_downgrades_to_file() {
    let env = TestEnv::new();
    let engine = env.engine(database_settings(&env, sqlite_url(&env)));

    let summary = engine.boot().await.expect("override_env is on");

    let state = engine.backend_state().await;
    assert_eq!(state.configured, CacheBackend::Database);
    assert_eq!(state.active, CacheBackend::File);
    assert!(state.is_downgraded());
    assert_eq!(env.sink.count_kind(BACKEND_DOWNGRADED), 1);

    // Injection is unaffected by the downgrade.
    assert_eq!(summary.written, vec!["app.api_key".to_string()]);
    assert_eq!(env.config_str("app.api_key").as_deref(), Some("abc123"));
    assert!(env.dir.path().join(".cloudkeys/cache").is_dir());
}

#[tokio::test]
async fn test_existing_cache_table_keeps_database_backend() {
    let env = TestEnv::new();
    let settings = database_settings(&env, sqlite_url(&env));

    let pool = create_pool(&settings.database).await.unwrap();
    create_cache_table(&pool, "cache").await.unwrap();

    let engine = env.engine(settings);
    engine.boot().await;

    assert_eq!(engine.backend_state().await.active, CacheBackend::Database);
    assert_eq!(env.sink.count_kind(BACKEND_DOWNGRADED), 0);

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM cache WHERE key = 'vault.secret.API_KEY'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
    assert!(!env.dir.path().join(".cloudkeys/cache").exists());
}

#[tokio::test]
async fn test_unreachable_database_downgrades_to_file() {
    let env = TestEnv::new();
    let url = format!(
        "sqlite://{}",
        env.dir.path().join("no-such-dir").join("cache.db").display()
    );
    let engine = env.engine(database_settings(&env, url));

    engine.boot().await;

    assert_eq!(engine.backend_state().await.active, CacheBackend::File);
    assert_eq!(env.sink.count_kind(BACKEND_DOWNGRADED), 1);
    assert_eq!(env.config_str("app.api_key").as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_guard_runs_once_per_engine() {
    let env = TestEnv::new();
    let engine = env.engine(database_settings(&env, sqlite_url(&env)));

    engine.boot().await;
    engine.inject().await;
    engine.refresh().await;

    assert_eq!(env.sink.count_kind(BACKEND_DOWNGRADED), 1);
}
