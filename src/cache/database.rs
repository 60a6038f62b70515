//! SQLite-backed cache store.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

use super::store::{CacheStore, CachedValue};
use crate::errors::{Error, Result};
use crate::storage::{validate_table_name, DbPool};

/// Stores entries in a `key, value, expiration` table.
///
/// The table must already exist (see [`crate::storage::create_cache_table`]);
/// the cache store guard checks for it before this store is selected.
#[derive(Debug, Clone)]
pub struct DatabaseCacheStore {
    pool: DbPool,
    table: String,
}

impl DatabaseCacheStore {
    pub fn new(pool: DbPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn db_error(&self, e: sqlx::Error, action: &str, key: &str) -> Error {
        Error::Database {
            source: e,
            context: format!("Failed to {} cache key '{}' in table '{}'", action, key, self.table),
        }
    }
}

#[async_trait]
impl CacheStore for DatabaseCacheStore {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedValue>> {
        let query = format!("SELECT value, expiration FROM {} WHERE key = ?", self.table);
        let row: Option<(String, i64)> = sqlx::query_as(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.db_error(e, "read", key))?;

        let Some((value, expiration)) = row else {
            return Ok(None);
        };

        if expiration <= Utc::now().timestamp() {
            debug!(key = %key, table = %self.table, "Cache entry expired");
            self.forget(key).await?;
            return Ok(None);
        }

        let value = serde_json::from_str(&value).map_err(|e| Error::Serialization {
            source: e,
            context: format!("Corrupt cache entry for key '{}'", key),
        })?;
        Ok(Some(value))
    }

    async fn put(&self, key: &str, value: CachedValue, ttl: Duration) -> Result<()> {
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| Error::cache(format!("TTL out of range: {:?}", ttl)))?;
        let expiration = Utc::now().timestamp().saturating_add(ttl_secs);
        let value = serde_json::to_string(&value)?;

        let query = format!(
            "INSERT INTO {} (key, value, expiration) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expiration = excluded.expiration",
            self.table
        );
        sqlx::query(&query)
            .bind(key)
            .bind(value)
            .bind(expiration)
            .execute(&self.pool)
            .await
            .map_err(|e| self.db_error(e, "write", key))?;

        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool> {
        let query = format!("DELETE FROM {} WHERE key = ?", self.table);
        let result = sqlx::query(&query)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| self.db_error(e, "delete", key))?;

        Ok(result.rows_affected() > 0)
    }
}
