//! Cache store guard.
//!
//! Runs once at boot. A `database` backend whose cache table is missing (or
//! whose database cannot be reached) is downgraded to the `file` backend for
//! the rest of the process instead of failing injection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::secrets::{Diagnostic, DiagnosticSink};
use crate::storage::SchemaInspector;

/// Diagnostic kind emitted when the guard switches backends.
pub const BACKEND_DOWNGRADED: &str = "cache_backend_downgraded";

/// Cache store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    #[default]
    File,
    Database,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackend::Memory => "memory",
            CacheBackend::File => "file",
            CacheBackend::Database => "database",
        }
    }

    /// Whether the backend needs a storage object to exist before use.
    pub fn requires_schema(&self) -> bool {
        matches!(self, CacheBackend::Database)
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured vs. actually usable backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheBackendState {
    pub configured: CacheBackend,
    pub active: CacheBackend,
}

impl CacheBackendState {
    /// State before the guard has run: the configured backend is assumed usable.
    pub fn unchecked(configured: CacheBackend) -> Self {
        Self { configured, active: configured }
    }

    pub fn is_downgraded(&self) -> bool {
        self.configured != self.active
    }
}

/// Checks the configured backend's prerequisites.
pub struct CacheStoreGuard {
    inspector: Option<Arc<dyn SchemaInspector>>,
    table: String,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for CacheStoreGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStoreGuard")
            .field("table", &self.table)
            .field("has_inspector", &self.inspector.is_some())
            .finish()
    }
}

impl CacheStoreGuard {
    /// `inspector` is `None` when no database connection could be opened.
    pub fn new(
        inspector: Option<Arc<dyn SchemaInspector>>,
        table: impl Into<String>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self { inspector, table: table.into(), diagnostics }
    }

    /// Decide which backend is usable. Never fails.
    pub async fn ensure_usable_backend(&self, configured: CacheBackend) -> CacheBackendState {
        if !configured.requires_schema() {
            return CacheBackendState::unchecked(configured);
        }

        let reason = match &self.inspector {
            None => Some("database is unavailable".to_string()),
            Some(inspector) => match inspector.has_table(&self.table).await {
                Ok(true) => None,
                Ok(false) => Some(format!("cache table '{}' does not exist", self.table)),
                Err(e) => Some(format!("schema check failed: {}", e)),
            },
        };

        let Some(reason) = reason else {
            info!(backend = %configured, table = %self.table, "Cache backend is usable");
            return CacheBackendState::unchecked(configured);
        };

        let state = CacheBackendState { configured, active: CacheBackend::File };
        self.diagnostics.emit(Diagnostic::info(
            BACKEND_DOWNGRADED,
            format!(
                "Cache backend '{}' is not usable ({}); falling back to '{}'",
                state.configured, reason, state.active
            ),
        ));
        state
    }
}
