//! Vault KV v2 secret source authenticated with a static token.
//!
//! Issues `GET {url}{path}` with an `X-Vault-Token` header and extracts the
//! inner `data.data` object of the KV v2 response envelope:
//!
//! ```json
//! { "data": { "data": { "DB_PASS": "xyz" }, "metadata": { "version": 3 } } }
//! ```
//!
//! Each attempt is bounded by a request timeout; transport failures and
//! 5xx/429 responses are retried with a fixed delay.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::error::{SourceError, SourceResult};
use super::file::object_into_secret_set;
use super::types::{RemoteTokenSource, SecretSet};
use crate::errors::{Error, Result};

/// Header carrying the Vault token.
pub const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

// ============================================================================
// HTTP seam
// ============================================================================

/// Minimal HTTP response used by the remote reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client used for remote secret fetches.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request with the given headers and per-request timeout.
    ///
    /// Non-success statuses are returned as responses, not errors. Errors are
    /// reserved for transport failures and timeouts.
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    /// Wrap an already configured client (proxies, custom TLS roots, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Attempt count, inter-attempt delay and per-request timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// KV v2 envelope
// ============================================================================

#[derive(Debug, Deserialize)]
struct KvV2Envelope {
    data: Option<KvV2Data>,
}

#[derive(Debug, Deserialize)]
struct KvV2Data {
    data: Option<serde_json::Value>,
}

/// Extract the `data.data` object of a KV v2 response body.
pub fn parse_kv2_body(source_name: &str, body: &str) -> SourceResult<SecretSet> {
    let envelope: KvV2Envelope = serde_json::from_str(body)
        .map_err(|e| SourceError::fetch_failed(source_name, format!("malformed body: {}", e)))?;

    match envelope.data.and_then(|outer| outer.data) {
        Some(serde_json::Value::Object(map)) => Ok(object_into_secret_set(map)),
        Some(_) => Err(SourceError::fetch_failed(source_name, "data.data is not an object")),
        None => Err(SourceError::fetch_failed(source_name, "response has no data.data object")),
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Outcome of a single attempt.
enum Attempt {
    Done(SourceResult<SecretSet>),
    Retry(String),
}

/// Reads secrets from a token-authenticated Vault KV v2 endpoint.
#[derive(Clone)]
pub struct RemoteTokenReader {
    http: Arc<dyn HttpClient>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RemoteTokenReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTokenReader")
            .field("policy", &self.policy)
            .field("http", &"[HttpClient]")
            .finish()
    }
}

impl RemoteTokenReader {
    pub fn new(http: Arc<dyn HttpClient>, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch one remote source.
    ///
    /// # Errors
    ///
    /// - [`SourceError::MisconfiguredSource`] if token, path or url is empty
    /// - [`SourceError::FetchFailed`] on transport failure, non-success status
    ///   after all attempts, or a body without a `data.data` object
    pub async fn read(&self, source: &RemoteTokenSource) -> SourceResult<SecretSet> {
        validate_source(source)?;

        let url = source.effective_url();
        let attempts = self.policy.max_attempts.max(1);
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            match self.attempt(source, &url).await {
                Attempt::Done(result) => {
                    if let Ok(secrets) = &result {
                        debug!(
                            path = %source.path,
                            attempt = attempt,
                            count = secrets.len(),
                            "Fetched secrets from Vault"
                        );
                    }
                    return result;
                }
                Attempt::Retry(reason) => {
                    if attempt < attempts {
                        warn!(
                            path = %source.path,
                            error = %reason,
                            attempt = attempt,
                            "Vault request failed, retrying"
                        );
                        tokio::time::sleep(self.policy.delay).await;
                    } else {
                        error!(
                            path = %source.path,
                            error = %reason,
                            attempts = attempts,
                            "Vault request failed after all retries"
                        );
                    }
                    last_failure = reason;
                }
            }
        }

        Err(SourceError::fetch_failed(&source.path, last_failure))
    }

    async fn attempt(&self, source: &RemoteTokenSource, url: &str) -> Attempt {
        let headers = [(VAULT_TOKEN_HEADER, source.token.expose_secret())];

        let failure = match self.http.get(url, &headers, self.policy.timeout).await {
            Ok(response) if response.is_success() => {
                return Attempt::Done(parse_kv2_body(&source.path, &response.body));
            }
            Ok(response) => {
                Error::http(format!("HTTP {}", response.status), Some(response.status))
            }
            Err(e) => e,
        };

        if failure.is_retryable() {
            Attempt::Retry(failure.to_string())
        } else {
            Attempt::Done(Err(SourceError::fetch_failed(&source.path, failure.to_string())))
        }
    }
}

fn validate_source(source: &RemoteTokenSource) -> SourceResult<()> {
    let mut missing = Vec::new();
    if source.token.is_empty() {
        missing.push("token");
    }
    if source.path.trim().is_empty() {
        missing.push("path");
    }
    if source.url.trim().is_empty() {
        missing.push("url");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SourceError::misconfigured(format!(
            "remote source is missing {}",
            missing.join("/")
        )))
    }
}
