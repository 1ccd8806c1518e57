//! Input records.

use chrono::Utc;
use serde_json::Value;

/// One record of a stream.
///
/// The payload is opaque to the writer; encoders decide how it maps to a row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub stream: String,
    pub namespace: Option<String>,
    /// Epoch milliseconds at which the record was emitted.
    pub emitted_at: i64,
    pub data: Value,
}

impl Record {
    /// Create a record for `stream`, emitted now.
    pub fn new(stream: impl Into<String>, data: Value) -> Self {
        Self {
            stream: stream.into(),
            namespace: None,
            emitted_at: Utc::now().timestamp_millis(),
            data,
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_emitted_at(mut self, emitted_at: i64) -> Self {
        self.emitted_at = emitted_at;
        self
    }
}
