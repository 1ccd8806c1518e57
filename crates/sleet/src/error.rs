//! Error types for the sleet writer.

use snafu::prelude::*;

pub use sleet_core::error::{ConfigError, StorageError};

use crate::writer::WriterState;

/// Errors raised while turning a record into a row.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EncodingError {
    /// Root level flattening needs a JSON object payload.
    #[snafu(display("Record payload for stream '{stream}' is not a JSON object"))]
    NotAnObject { stream: String },

    /// The JSON schema cannot produce a header.
    #[snafu(display("Invalid JSON schema: {message}"))]
    InvalidSchema { message: String },

    /// A data row does not line up with the header row.
    #[snafu(display("Row has {actual} fields but the header has {expected}"))]
    FieldCountMismatch { expected: usize, actual: usize },

    /// The CSV serializer rejected a row.
    #[snafu(display("Failed to serialize CSV row: {source}"))]
    CsvSerialize { source: csv::Error },

    /// Flushing the serialized row failed.
    #[snafu(display("Failed to flush CSV row: {source}"))]
    CsvFlush { source: std::io::Error },
}

/// Errors raised by the chunked upload sink.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Write after the sink was closed.
    #[snafu(display("Sink is closed"))]
    Closed,

    /// The upload workers are gone.
    #[snafu(display("Upload queue closed unexpectedly"))]
    QueueClosed,
}

/// Errors raised by the multipart part uploader.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum UploadError {
    /// The store refused to open a multipart upload.
    #[snafu(display("Failed to open multipart upload: {source}"))]
    OpenSession { source: StorageError },

    /// A part was rejected by the store.
    #[snafu(display("Failed to upload part {index}: {source}"))]
    PartUpload { index: usize, source: StorageError },

    /// Fewer parts were accepted than were submitted.
    #[snafu(display("Expected {expected} uploaded parts, found {actual}"))]
    MissingParts { expected: usize, actual: usize },

    /// The store rejected the complete call.
    #[snafu(display("Failed to complete multipart upload: {source}"))]
    Finalize { source: StorageError },

    /// The store rejected the abort call.
    #[snafu(display("Failed to abort multipart upload: {source}"))]
    Abort { source: StorageError },

    /// An upload worker panicked.
    #[snafu(display("Upload worker failed: {source}"))]
    WorkerJoin { source: tokio::task::JoinError },

    /// The session was already completed or aborted.
    #[snafu(display("Multipart upload is already {status}"))]
    SessionClosed { status: &'static str },
}

/// Errors returned by record writers.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriterError {
    /// Encoding error.
    #[snafu(display("Encoding error: {source}"))]
    Encoding { source: EncodingError },

    /// Sink error.
    #[snafu(display("Sink error: {source}"))]
    Sink { source: SinkError },

    /// Upload error.
    #[snafu(display("Upload error: {source}"))]
    Upload { source: UploadError },

    /// Writer options failed validation.
    #[snafu(display("Invalid writer options: {source}"))]
    InvalidOptions { source: ConfigError },

    /// Operation not allowed in the current state.
    #[snafu(display("Cannot {operation} a writer that is {state}"))]
    Usage {
        operation: &'static str,
        state: WriterState,
    },
}

/// Top-level ingestion errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Storage error.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// The encoder could not be built.
    #[snafu(display("Encoder error: {source}"))]
    Encoder { source: EncodingError },

    /// Writer error.
    #[snafu(display("Writer error: {source}"))]
    Writer { source: WriterError },

    /// Failed to read input.
    #[snafu(display("Failed to read input {path}: {source}"))]
    ReadInput {
        path: String,
        source: std::io::Error,
    },

    /// An input line is not valid JSON.
    #[snafu(display("Invalid JSON record on line {line}: {source}"))]
    RecordParse {
        line: usize,
        source: serde_json::Error,
    },
}
