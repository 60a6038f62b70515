//! Secret sources and resolution.
//!
//! Secrets come from one of two kinds of source, selected by
//! [`ResolutionMode`]:
//!
//! - **File**: `.env`-style or JSON files read by [`FileReader`]
//! - **Token**: Vault KV v2 endpoints read by [`RemoteTokenReader`] with an
//!   `X-Vault-Token` header and bounded retry
//!
//! [`SecretResolver`] reads every source of the active mode, merges them in
//! list order (later sources win) and turns per-source failures into
//! [`Diagnostic`]s instead of errors. A source that fails contributes
//! nothing; the others still resolve.
//!
//! # Example
//!
//! ```rust,ignore
//! use cloudkeys::secrets::{
//!     RemoteTokenReader, RemoteTokenSource, ReqwestHttpClient, ResolutionMode,
//!     RetryPolicy, SecretResolver, TracingSink,
//! };
//! use std::sync::Arc;
//!
//! let reader = RemoteTokenReader::new(Arc::new(ReqwestHttpClient::new()), RetryPolicy::default());
//! let resolver = SecretResolver::new(
//!     ResolutionMode::Token,
//!     vec![RemoteTokenSource::new(token, "/v1/secret/data/app", "http://127.0.0.1:8200").into()],
//!     reader,
//!     Arc::new(TracingSink),
//! );
//!
//! let secrets = resolver.resolve().await;
//! ```

pub mod diagnostics;
pub mod error;
pub mod file;
pub mod remote;
pub mod resolver;
pub mod types;

pub use diagnostics::{Diagnostic, DiagnosticSink, RecordingSink, Severity, TracingSink};
pub use error::{SourceError, SourceResult};
pub use file::{parse_env_content, parse_json_content, FileReader};
pub use remote::{
    parse_kv2_body, HttpClient, HttpResponse, RemoteTokenReader, ReqwestHttpClient, RetryPolicy,
    VAULT_TOKEN_HEADER,
};
pub use resolver::{merge_results, Resolution, SecretResolver};
pub use types::{
    redact_secret, FileFormat, KeyMapping, MappingEntry, RemoteTokenSource, ResolutionMode,
    SecretFile, SecretSet, SecretString, SourceDescriptor,
};
