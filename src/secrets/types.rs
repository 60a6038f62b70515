//! Core types for secret resolution.
//!
//! [`SecretSet`] is the merged key/value result of one resolution pass.
//! [`SourceDescriptor`] names where secrets come from, [`ResolutionMode`]
//! selects which kind of source is read, and [`KeyMapping`] says which
//! secrets land under which configuration keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// SecretString
// ============================================================================

/// A string wrapper that redacts its contents in Debug, Display, and serialization.
///
/// Used for Vault tokens so they never show up in logs or in a serialized
/// settings dump. Memory is zeroed on drop. The raw value is only reachable
/// through [`SecretString::expose_secret`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(SecretString(value))
    }
}

impl SecretString {
    /// Creates a new SecretString from a string value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the underlying secret value.
    ///
    /// Only call this where the raw value is actually needed, such as
    /// building a request header. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Returns true if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Default for SecretString {
    fn default() -> Self {
        Self::new("")
    }
}

/// Redact a secret value for display (show first 2 and last 2 chars).
pub fn redact_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}

// ============================================================================
// SecretSet
// ============================================================================

/// Mapping of secret key to secret value produced by one resolution pass.
///
/// Keys are unique; merging is "last writer wins". The `Debug` output lists
/// keys only.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretSet(BTreeMap<String, String>);

impl SecretSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a secret value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert a secret, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Merge `other` into `self`; keys in `other` overwrite existing keys.
    pub fn merge(&mut self, other: SecretSet) {
        self.0.extend(other.0);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for SecretSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSet").field("keys", &self.0.keys().collect::<Vec<_>>()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ============================================================================
// Source descriptors
// ============================================================================

/// Format of a local secret file, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `KEY=VALUE` lines.
    EnvStyle,
    /// A single JSON object.
    Json,
}

impl FileFormat {
    /// `.json` files are JSON; everything else is env-style.
    pub fn infer(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => FileFormat::Json,
            _ => FileFormat::EnvStyle,
        }
    }
}

/// A local secret file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFile {
    pub path: PathBuf,
    pub format: FileFormat,
}

impl SecretFile {
    /// Build a descriptor, resolving relative paths against `base_dir`.
    pub fn resolve(path: impl AsRef<Path>, base_dir: &Path) -> Self {
        let path = path.as_ref();
        let path =
            if path.is_absolute() { path.to_path_buf() } else { base_dir.join(path) };
        let format = FileFormat::infer(&path);
        Self { path, format }
    }
}

/// A Vault KV v2 endpoint authenticated with a static token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTokenSource {
    /// Value sent in the `X-Vault-Token` header.
    #[serde(default)]
    pub token: SecretString,
    /// API path appended to the base URL, e.g. `/v1/secret/data/app`.
    #[serde(default)]
    pub path: String,
    /// Base URL of the Vault server, e.g. `http://127.0.0.1:8200`.
    #[serde(default)]
    pub url: String,
}

impl RemoteTokenSource {
    pub fn new(
        token: impl Into<SecretString>,
        path: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self { token: token.into(), path: path.into(), url: url.into() }
    }

    /// Base URL without trailing slashes, followed by the path.
    pub fn effective_url(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), self.path)
    }
}

/// Where a set of secrets comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    File(SecretFile),
    RemoteToken(RemoteTokenSource),
}

impl SourceDescriptor {
    /// Human-readable source name for logs. Never includes the token.
    pub fn name(&self) -> String {
        match self {
            SourceDescriptor::File(file) => file.path.display().to_string(),
            SourceDescriptor::RemoteToken(source) => source.path.clone(),
        }
    }

    /// Resolution mode this source belongs to.
    pub fn mode(&self) -> ResolutionMode {
        match self {
            SourceDescriptor::File(_) => ResolutionMode::File,
            SourceDescriptor::RemoteToken(_) => ResolutionMode::Token,
        }
    }
}

impl From<SecretFile> for SourceDescriptor {
    fn from(file: SecretFile) -> Self {
        SourceDescriptor::File(file)
    }
}

impl From<RemoteTokenSource> for SourceDescriptor {
    fn from(source: RemoteTokenSource) -> Self {
        SourceDescriptor::RemoteToken(source)
    }
}

// ============================================================================
// Resolution mode
// ============================================================================

/// Selects which kind of source the resolver reads.
///
/// Parsed once from settings; unknown or empty strings become
/// [`ResolutionMode::Unsupported`] carrying the raw value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResolutionMode {
    #[default]
    File,
    Token,
    Unsupported(String),
}

impl From<String> for ResolutionMode {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => ResolutionMode::File,
            "token" => ResolutionMode::Token,
            _ => ResolutionMode::Unsupported(value),
        }
    }
}

impl From<&str> for ResolutionMode {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ResolutionMode> for String {
    fn from(mode: ResolutionMode) -> Self {
        mode.as_str().to_string()
    }
}

impl ResolutionMode {
    pub fn as_str(&self) -> &str {
        match self {
            ResolutionMode::File => "file",
            ResolutionMode::Token => "token",
            ResolutionMode::Unsupported(raw) => raw,
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Key mapping
// ============================================================================

/// One `config key <- secret key` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Dotted configuration key, e.g. `services.mailgun.secret`.
    pub config: String,
    /// Key looked up in the resolved secret set.
    pub secret: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMapping {
    Entries(Vec<MappingEntry>),
    Table(BTreeMap<String, String>),
}

impl From<RawMapping> for KeyMapping {
    fn from(raw: RawMapping) -> Self {
        match raw {
            RawMapping::Entries(entries) => KeyMapping(entries),
            RawMapping::Table(table) => table.into_iter().collect(),
        }
    }
}

/// Ordered list of configuration keys and the secrets that populate them.
///
/// Deserializes either from a list of `{ config, secret }` entries or from a
/// table of `config_key = "SECRET_KEY"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMapping")]
pub struct KeyMapping(Vec<MappingEntry>);

impl KeyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mapping entry.
    pub fn push(&mut self, config_key: impl Into<String>, secret_key: impl Into<String>) {
        self.0.push(MappingEntry { config: config_key.into(), secret: secret_key.into() });
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappingEntry> {
        self.0.iter()
    }

    /// Distinct secret keys referenced by the mapping.
    pub fn secret_keys(&self) -> BTreeSet<&str> {
        self.0.iter().map(|entry| entry.secret.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<C: Into<String>, S: Into<String>> FromIterator<(C, S)> for KeyMapping {
    fn from_iter<I: IntoIterator<Item = (C, S)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(config, secret)| MappingEntry { config: config.into(), secret: secret.into() })
                .collect(),
        )
    }
}
