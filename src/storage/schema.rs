//! Schema introspection for the cache store guard.

use async_trait::async_trait;

use super::pool::DbPool;
use crate::errors::{Error, Result};

/// Answers whether a table exists in the backing database.
#[async_trait]
pub trait SchemaInspector: Send + Sync {
    async fn has_table(&self, table: &str) -> Result<bool>;
}

/// [`SchemaInspector`] backed by SQLite's `sqlite_master`.
#[derive(Debug, Clone)]
pub struct SqliteSchemaInspector {
    pool: DbPool,
}

impl SqliteSchemaInspector {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaInspector for SqliteSchemaInspector {
    async fn has_table(&self, table: &str) -> Result<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Error::Database {
                    source: e,
                    context: format!("Failed to inspect schema for table '{}'", table),
                })?;

        Ok(count > 0)
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are allowed.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::validation_field(
            format!("'{}' is not a valid table name", table),
            "cache_table",
        ))
    }
}

/// Create the cache table if it does not exist yet.
///
/// Columns mirror the usual cache table layout: `key`, `value` (serialized
/// entry) and `expiration` (unix seconds).
pub async fn create_cache_table(pool: &DbPool, table: &str) -> Result<()> {
    validate_table_name(table)?;

    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
            key TEXT PRIMARY KEY NOT NULL, \
            value TEXT NOT NULL, \
            expiration INTEGER NOT NULL\
        )"
    );
    sqlx::query(&statement).execute(pool).await.map_err(|e| Error::Database {
        source: e,
        context: format!("Failed to create cache table '{}'", table),
    })?;

    tracing::info!(table = %table, "Cache table ready");
    Ok(())
}
