//! # Storage and Persistence
//!
//! SQLite connectivity for the database-backed cache store, plus the schema
//! introspection the cache store guard relies on.

pub mod pool;
pub mod schema;

pub use pool::{create_pool, DbPool};
pub use schema::{create_cache_table, validate_table_name, SchemaInspector, SqliteSchemaInspector};
