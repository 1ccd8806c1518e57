//! sleet: streaming CSV writer with transactional multipart uploads.
//!
//! This crate handles:
//! - Encoding records into rows with a fixed header
//! - Serializing rows as CSV
//! - Cutting the byte stream into parts uploaded in parallel
//! - Committing the object only when every part made it, aborting otherwise

pub mod config;
pub mod encoder;
pub mod error;
pub mod ingest;
pub mod naming;
pub mod record;
pub mod sink;
pub mod writer;

/// Re-export storage module from sleet-core for convenience
pub mod storage {
    pub use sleet_core::storage::*;
}

// Re-export commonly used items
pub use config::{CliArgs, Config, WriterOptions};
pub use encoder::{Flattening, RowEncoder, SheetEncoder};
pub use error::{EncodingError, PipelineError, SinkError, UploadError, WriterError};
pub use ingest::{IngestSummary, run};
pub use naming::DestinationIdentity;
pub use record::Record;
pub use writer::{CsvFormat, CsvWriter, RecordWriter, RowFormat, TransactionalWriter, WriterState};

pub use sleet_core::{KB, MB, StorageProvider, StorageProviderRef, init_tracing};
