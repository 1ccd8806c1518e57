//! Destination naming.
//!
//! Objects are written to
//! `{key prefix}/{namespace}/{stream}/{YYYY_MM_DD}_{epoch_millis}{suffix}.{ext}`,
//! with the namespace segment omitted when the stream has none.

use chrono::{DateTime, Utc};
use object_store::path::Path;

use sleet_core::StorageProvider;

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Directory holding every object written for a stream, relative to the key prefix.
pub fn output_prefix(namespace: Option<&str>, stream: &str) -> Path {
    let mut parts = Vec::with_capacity(2);
    if let Some(namespace) = namespace.filter(|ns| !ns.is_empty()) {
        parts.push(normalize_name(namespace));
    }
    parts.push(normalize_name(stream));
    Path::from_iter(parts)
}

/// File name of an object uploaded at `timestamp`.
pub fn object_name(timestamp: DateTime<Utc>, suffix: &str, extension: &str) -> String {
    format!(
        "{}_{}{suffix}.{extension}",
        timestamp.format("%Y_%m_%d"),
        timestamp.timestamp_millis()
    )
}

/// Where a writer puts its single output object. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationIdentity {
    stream: String,
    bucket: String,
    key: String,
    location: Path,
}

impl DestinationIdentity {
    /// Compute the destination of a stream's object on `storage`.
    pub fn new(
        storage: &StorageProvider,
        namespace: Option<&str>,
        stream: &str,
        suffix: &str,
        extension: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let location = output_prefix(namespace, stream).child(object_name(timestamp, suffix, extension));
        let key = storage.qualify_path(&location).to_string();

        Self {
            stream: stream.to_string(),
            bucket: storage.config().container().to_string(),
            key,
            location,
        }
    }

    /// Stream the object belongs to.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Bucket, container or root directory.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Full object key, including the storage key prefix.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Object path relative to the storage key prefix.
    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl std::fmt::Display for DestinationIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket.trim_end_matches('/'), self.key)
    }
}
