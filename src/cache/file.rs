//! Filesystem cache store.
//!
//! One JSON document per key under the cache directory. File names are the
//! SHA-256 of the key so arbitrary keys map to safe names. Each document
//! carries an absolute expiry; expired documents read as absent and are
//! removed on access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::store::{CacheStore, CachedValue};
use crate::errors::{Error, Result};

/// Distinguishes temp files of concurrent writers within one process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    key: String,
    expires_at: DateTime<Utc>,
    value: CachedValue,
}

#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{}.json", digest))
    }

    async fn remove_file(&self, path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(e, format!("Failed to remove cache file {}", path.display()))),
        }
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedValue>> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::io(e, format!("Failed to read cache file {}", path.display())))
            }
        };

        let entry: FileEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, path = %path.display(), error = %e, "Discarding corrupt cache file");
                self.remove_file(&path).await?;
                return Ok(None);
            }
        };

        if entry.key != key || entry.expires_at <= Utc::now() {
            debug!(key = %key, "Cache entry expired");
            self.remove_file(&path).await?;
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    async fn put(&self, key: &str, value: CachedValue, ttl: Duration) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::io(e, format!("Failed to create cache directory {}", self.dir.display()))
        })?;

        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| Error::cache("TTL out of range"))?;
        let entry = FileEntry { key: key.to_string(), expires_at, value };
        let bytes = serde_json::to_vec(&entry)?;

        // Write then rename so readers never see a partial document.
        let path = self.entry_path(key);
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), seq));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| Error::io(e, format!("Failed to write cache file {}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::io(e, format!("Failed to move cache file {}", path.display())))?;

        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool> {
        self.remove_file(&self.entry_path(key)).await
    }
}
