//! Diagnostic emission for recovered secret failures.
//!
//! Readers and the resolver never fail outward. What went wrong is reported
//! through a [`DiagnosticSink`] handed to the engine at construction time,
//! together with informational events such as a cache backend downgrade.
//! [`TracingSink`] forwards to `tracing`; [`RecordingSink`] keeps the
//! diagnostics in memory for callers that want to inspect them.

use parking_lot::Mutex;
use std::sync::Arc;

use super::error::SourceError;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single recovered failure or noteworthy event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable snake_case identifier, e.g. `source_missing`.
    pub kind: &'static str,
    pub message: String,
    /// The source failure this diagnostic was built from, if any.
    pub error: Option<SourceError>,
}

impl Diagnostic {
    /// Default severity per error kind: missing files and unknown keys are
    /// warnings, everything that indicates broken configuration is an error.
    pub fn from_error(error: SourceError) -> Self {
        let severity = match error {
            SourceError::SourceMissing { .. } | SourceError::SecretNotFound { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        };
        Self { severity, kind: error.kind(), message: error.to_string(), error: Some(error) }
    }

    /// Informational event that is not a failure.
    pub fn info(kind: &'static str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Info, kind, message: message.into(), error: None }
    }
}

/// Fire-and-forget receiver of diagnostics.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        let kind = diagnostic.kind;
        match diagnostic.severity {
            Severity::Info => tracing::info!(kind, "{}", diagnostic.message),
            Severity::Warning => tracing::warn!(kind, "{}", diagnostic.message),
            Severity::Error => tracing::error!(kind, "{}", diagnostic.message),
        }
    }
}

/// Collects diagnostics in memory, optionally forwarding them to another sink.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<Diagnostic>>,
    forward: Option<Arc<dyn DiagnosticSink>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and also forward every diagnostic to `sink`.
    pub fn forwarding_to(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { records: Mutex::new(Vec::new()), forward: Some(sink) }
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.lock().clone()
    }

    /// Number of recorded diagnostics of the given kind.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.records.lock().iter().filter(|d| d.kind == kind).count()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        if let Some(forward) = &self.forward {
            forward.emit(diagnostic.clone());
        }
        self.records.lock().push(diagnostic);
    }
}

impl std::fmt::Debug for RecordingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSink").field("records", &self.records.lock().len()).finish()
    }
}
