//! Local file secret source.
//!
//! Reads `.env`-style (`KEY=VALUE` per line) and JSON object files. Each file
//! is read on its own; a missing or malformed file yields a [`SourceError`]
//! for that file only.

use serde_json::Value;
use std::io::ErrorKind;
use tracing::debug;

use super::error::{SourceError, SourceResult};
use super::types::{FileFormat, SecretFile, SecretSet};

/// Reads secrets from local files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileReader;

impl FileReader {
    pub fn new() -> Self {
        Self
    }

    /// Read one file into a secret set.
    ///
    /// # Errors
    ///
    /// - [`SourceError::SourceMissing`] if the file does not exist or cannot be read
    /// - [`SourceError::InvalidFormat`] if the content is not valid UTF-8 or,
    ///   for JSON files, not a JSON object
    pub async fn read(&self, file: &SecretFile) -> SourceResult<SecretSet> {
        let name = file.path.display().to_string();

        let bytes = match tokio::fs::read(&file.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::missing(name));
            }
            Err(e) => {
                debug!(path = %name, error = %e, "Failed to read secret file");
                return Err(SourceError::missing(name));
            }
        };

        let content = String::from_utf8(bytes)
            .map_err(|_| SourceError::invalid_format(&name, "file is not valid UTF-8"))?;

        let secrets = match file.format {
            FileFormat::Json => parse_json_content(&name, &content)?,
            FileFormat::EnvStyle => parse_env_content(&content),
        };

        debug!(path = %name, format = ?file.format, count = secrets.len(), "Read secret file");
        Ok(secrets)
    }
}

/// Parse `KEY=VALUE` lines.
///
/// Lines without `=` are skipped, the split happens at the first `=`, and
/// both sides are trimmed. Lines whose key trims to nothing are skipped.
pub fn parse_env_content(content: &str) -> SecretSet {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Parse a JSON object whose values become secret values.
///
/// Strings are taken verbatim, numbers and booleans use their JSON text,
/// nested objects and arrays are kept as compact JSON, and `null` entries
/// are dropped.
pub fn parse_json_content(source_name: &str, content: &str) -> SourceResult<SecretSet> {
    let document: Value = serde_json::from_str(content)
        .map_err(|e| SourceError::invalid_format(source_name, e.to_string()))?;

    let Value::Object(map) = document else {
        return Err(SourceError::invalid_format(source_name, "top-level value is not an object"));
    };

    Ok(object_into_secret_set(map))
}

/// Convert a JSON object into a secret set using the value rules of
/// [`parse_json_content`].
pub(crate) fn object_into_secret_set(map: serde_json::Map<String, Value>) -> SecretSet {
    map.into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}
