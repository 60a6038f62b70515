//! Common test utilities for all integration tests.
//!
//! Provides a temporary base directory for secret files and caches, a mocked
//! Vault KV v2 endpoint, and an engine wired to a recording diagnostic sink.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use cloudkeys::cache::CacheBackend;
use cloudkeys::config::{HttpSettings, JsonConfigStore};
use cloudkeys::secrets::RecordingSink;
use cloudkeys::{SecretEngine, Settings};
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "hvs.test-token";

/// Temporary working area for one test.
pub struct TestEnv {
    pub dir: TempDir,
    pub config: Arc<JsonConfigStore>,
    pub sink: Arc<RecordingSink>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
            config: Arc::new(JsonConfigStore::new()),
            sink: Arc::new(RecordingSink::new()),
        }
    }

    /// Write a file under the base directory.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("write test file");
        path
    }

    /// Settings rooted at the temp dir, using the in-memory cache store and
    /// a short retry delay.
    pub fn settings(&self) -> Settings {
        Settings {
            base_path: Some(self.dir.path().to_path_buf()),
            cache_store: CacheBackend::Memory,
            http: fast_http(),
            ..Default::default()
        }
    }

    pub fn engine(&self, settings: Settings) -> SecretEngine {
        SecretEngine::builder(settings)
            .config_store(self.config.clone())
            .diagnostics(self.sink.clone())
            .build()
            .expect("build engine")
    }

    pub fn config_str(&self, key: &str) -> Option<String> {
        self.config.get_str(key)
    }
}

pub fn fast_http() -> HttpSettings {
    HttpSettings { retry_delay_ms: 10, timeout_seconds: 2, ..Default::default() }
}

/// KV v2 response envelope around `secrets`.
pub fn kv2_body(secrets: &[(&str, &str)]) -> Value {
    let data: Map<String, Value> =
        secrets.iter().map(|(k, v)| (k.to_string(), Value::String(v.to_string()))).collect();
    json!({
        "data": {
            "data": data,
            "metadata": { "version": 1, "destroyed": false }
        }
    })
}

/// Mount a KV v2 secret at `vault_path` that requires [`TEST_TOKEN`].
pub async fn mount_secret(server: &MockServer, vault_path: &str, secrets: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(vault_path))
        .and(header("X-Vault-Token", TEST_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(kv2_body(secrets)))
        .mount(server)
        .await;
}
