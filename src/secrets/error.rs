//! Error types for secret source operations.
//!
//! Every variant here is recovered at the reader/resolver boundary: it turns
//! into an empty (or partial) [`SecretSet`](super::SecretSet) plus a
//! diagnostic, never a failure the caller has to handle.

use thiserror::Error;

/// Result type for secret source reads.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Errors that can occur while reading a single secret source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// File not found or source unreachable.
    #[error("Secret source missing: {source_name}")]
    SourceMissing { source_name: String },

    /// Malformed JSON or a non-object document.
    #[error("Invalid format in {source_name}: {reason}")]
    InvalidFormat { source_name: String, reason: String },

    /// Token, path or URL missing from a remote source.
    #[error("Misconfigured source: {reason}")]
    MisconfiguredSource { reason: String },

    /// Non-success HTTP response, transport failure or malformed envelope.
    #[error("Fetch failed for {source_name}: {reason}")]
    FetchFailed { source_name: String, reason: String },

    /// Resolution mode is not one of the known modes.
    #[error("Unsupported resolution mode: {mode}")]
    UnsupportedMode { mode: String },

    /// Key absent from every source after a full resolution.
    #[error("Secret key not found in any source: {key}")]
    SecretNotFound { key: String },
}

impl SourceError {
    /// Create a source missing error.
    pub fn missing(source_name: impl Into<String>) -> Self {
        Self::SourceMissing { source_name: source_name.into() }
    }

    /// Create an invalid format error.
    pub fn invalid_format(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat { source_name: source_name.into(), reason: reason.into() }
    }

    /// Create a misconfigured source error.
    pub fn misconfigured(reason: impl Into<String>) -> Self {
        Self::MisconfiguredSource { reason: reason.into() }
    }

    /// Create a fetch failed error.
    pub fn fetch_failed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailed { source_name: source_name.into(), reason: reason.into() }
    }

    /// Create an unsupported mode error.
    pub fn unsupported_mode(mode: impl Into<String>) -> Self {
        Self::UnsupportedMode { mode: mode.into() }
    }

    /// Create a secret not found error.
    pub fn secret_not_found(key: impl Into<String>) -> Self {
        Self::SecretNotFound { key: key.into() }
    }

    /// Stable snake_case name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::SourceMissing { .. } => "source_missing",
            SourceError::InvalidFormat { .. } => "invalid_format",
            SourceError::MisconfiguredSource { .. } => "misconfigured_source",
            SourceError::FetchFailed { .. } => "fetch_failed",
            SourceError::UnsupportedMode { .. } => "unsupported_mode",
            SourceError::SecretNotFound { .. } => "secret_not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = SourceError::missing("/etc/app/.env");
        assert!(matches!(err, SourceError::SourceMissing { .. }));
        assert_eq!(err.to_string(), "Secret source missing: /etc/app/.env");

        let err = SourceError::fetch_failed("/v1/secret/data/app", "HTTP 500");
        assert!(matches!(err, SourceError::FetchFailed { .. }));
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(SourceError::misconfigured("no token").kind(), "misconfigured_source");
        assert_eq!(SourceError::unsupported_mode("ldap").kind(), "unsupported_mode");
        assert_eq!(SourceError::secret_not_found("API_KEY").kind(), "secret_not_found");
        assert_eq!(SourceError::invalid_format("a.json", "eof").kind(), "invalid_format");
    }
}
