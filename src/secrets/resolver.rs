//! Secret resolver.
//!
//! Reads every source configured for the active [`ResolutionMode`], merges
//! the results in source-list order (later sources win) and reports per-source
//! failures through the diagnostic sink. Resolution never fails outward.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

use super::diagnostics::{Diagnostic, DiagnosticSink};
use super::error::{SourceError, SourceResult};
use super::file::FileReader;
use super::remote::RemoteTokenReader;
use super::types::{ResolutionMode, SecretSet, SourceDescriptor};

/// Result of one resolution pass together with the failures that were
/// recovered along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub secrets: SecretSet,
    pub errors: Vec<SourceError>,
}

impl Resolution {
    /// True when at least one source failed.
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Orchestrates the source readers for the configured mode.
#[derive(Clone)]
pub struct SecretResolver {
    mode: ResolutionMode,
    sources: Vec<SourceDescriptor>,
    file_reader: FileReader,
    remote_reader: RemoteTokenReader,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl std::fmt::Debug for SecretResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretResolver")
            .field("mode", &self.mode)
            .field("sources", &self.sources.iter().map(SourceDescriptor::name).collect::<Vec<_>>())
            .finish()
    }
}

impl SecretResolver {
    /// Sources that do not belong to `mode` are ignored; modes never mix.
    pub fn new(
        mode: ResolutionMode,
        sources: Vec<SourceDescriptor>,
        remote_reader: RemoteTokenReader,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            mode,
            sources,
            file_reader: FileReader::new(),
            remote_reader,
            diagnostics,
        }
    }

    pub fn mode(&self) -> &ResolutionMode {
        &self.mode
    }

    /// Resolve and merge all sources of the active mode.
    pub async fn resolve(&self) -> SecretSet {
        self.resolve_with_report().await.secrets
    }

    /// Resolve and merge all sources, returning the recovered failures
    /// alongside the merged set. Every failure is also emitted as a
    /// diagnostic.
    pub async fn resolve_with_report(&self) -> Resolution {
        let results = match &self.mode {
            ResolutionMode::Unsupported(mode) => vec![Err(SourceError::unsupported_mode(mode))],
            mode => {
                // Reads run concurrently; join_all keeps the list order for merging.
                let active = self.sources.iter().filter(|source| source.mode() == *mode);
                join_all(active.map(|source| self.read_source(source))).await
            }
        };

        let resolution = merge_results(results);
        for error in &resolution.errors {
            self.diagnostics.emit(Diagnostic::from_error(error.clone()));
        }

        info!(
            mode = %self.mode,
            keys = resolution.secrets.len(),
            failed_sources = resolution.errors.len(),
            "Resolved secrets"
        );
        resolution
    }

    async fn read_source(&self, source: &SourceDescriptor) -> SourceResult<SecretSet> {
        let result = match source {
            SourceDescriptor::File(file) => self.file_reader.read(file).await,
            SourceDescriptor::RemoteToken(remote) => self.remote_reader.read(remote).await,
        };
        match &result {
            Ok(secrets) => debug!(source = %source.name(), keys = secrets.len(), "Read secret source"),
            Err(error) => debug!(source = %source.name(), kind = error.kind(), error = %error, "Secret source failed"),
        }
        result
    }
}

/// Merge per-source results in order. Later successful sources overwrite
/// earlier ones on key collision; failures are collected, not merged.
pub fn merge_results(results: Vec<SourceResult<SecretSet>>) -> Resolution {
    let mut resolution = Resolution::default();
    for result in results {
        match result {
            Ok(secrets) => resolution.secrets.merge(secrets),
            Err(error) => resolution.errors.push(error),
        }
    }
    resolution
}
