//! Transactional record writers.
//!
//! A [`TransactionalWriter`] owns exactly one multipart upload. Records are
//! encoded, serialized by a [`RowFormat`] and streamed through a
//! [`ChunkedUploadSink`]; `close` then either commits the object or discards
//! every uploaded part, so readers never see a partial object.

pub mod csv;

pub use self::csv::{CsvFormat, RowFormat};

use async_trait::async_trait;
use snafu::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sleet_core::config::S3_MIN_PART_SIZE;
use sleet_core::emit;
use sleet_core::metrics::events::RecordsWritten;
use sleet_core::StorageProviderRef;

use crate::config::WriterOptions;
use crate::encoder::{RowEncoder, SheetEncoder};
use crate::error::{
    EncodingError, EncodingSnafu, InvalidOptionsSnafu, SinkSnafu, UploadSnafu, UsageSnafu,
    WriterError,
};
use crate::naming::DestinationIdentity;
use crate::record::Record;
use crate::sink::{ChunkedUploadSink, PartUploader};

/// Lifecycle of a writer. `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Open,
    Committed,
    Aborted,
}

impl std::fmt::Display for WriterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WriterState::Open => "open",
            WriterState::Committed => "committed",
            WriterState::Aborted => "aborted",
        })
    }
}

/// Writes records to a single destination object.
#[async_trait]
pub trait RecordWriter: Send {
    /// Append one record.
    async fn write(&mut self, id: Uuid, record: &Record) -> Result<(), WriterError>;

    /// Commit the object when `succeeded`, otherwise discard it.
    async fn close(&mut self, succeeded: bool) -> Result<(), WriterError>;

    /// Full key of the destination object.
    fn object_key(&self) -> &str;
}

/// CSV writer over the configured sheet encoder.
pub type CsvWriter = TransactionalWriter<CsvFormat>;

/// Encoder + row format composed over a chunked multipart upload.
pub struct TransactionalWriter<F: RowFormat, E: RowEncoder = SheetEncoder> {
    encoder: E,
    format: F,
    sink: ChunkedUploadSink,
    destination: DestinationIdentity,
    header_len: usize,
    state: WriterState,
    records_written: u64,
}

impl<F: RowFormat, E: RowEncoder> TransactionalWriter<F, E> {
    /// Open the upload at `destination` and write the header row.
    pub async fn create(
        storage: StorageProviderRef,
        destination: DestinationIdentity,
        encoder: E,
        format: F,
        options: &WriterOptions,
    ) -> Result<Self, WriterError> {
        options.validate().context(InvalidOptionsSnafu)?;

        if storage.config().is_cloud() && options.part_size < S3_MIN_PART_SIZE {
            warn!(
                target = %destination.stream(),
                part_size = options.part_size,
                "Part size is below the 5 MiB minimum most object stores accept"
            );
        }

        let header = encoder.header_row();
        let header_bytes = format.encode_row(&header).context(EncodingSnafu)?;

        let storage_url = storage.canonical_url().to_string();
        let uploader = PartUploader::start(
            storage,
            destination.location().clone(),
            options,
            destination.stream().to_string(),
        )
        .await
        .context(UploadSnafu)?;

        info!(
            target = %destination.stream(),
            columns = header.len(),
            storage = %storage_url,
            "Writing to {destination}"
        );

        let mut writer = Self {
            encoder,
            format,
            sink: ChunkedUploadSink::new(uploader, options.part_size),
            destination,
            header_len: header.len(),
            state: WriterState::Open,
            records_written: 0,
        };

        if let Err(source) = writer.sink.write(&header_bytes).await {
            writer.abort_quietly().await;
            return Err(source).context(SinkSnafu);
        }

        Ok(writer)
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), WriterError> {
        ensure!(
            self.state == WriterState::Open,
            UsageSnafu {
                operation,
                state: self.state
            }
        );
        Ok(())
    }

    /// Encode `record` and append it to the object.
    ///
    /// A failed write leaves the writer open.
    pub async fn write(&mut self, id: Uuid, record: &Record) -> Result<(), WriterError> {
        self.ensure_open("write")?;

        let fields = self.encoder.data_row(id, record).context(EncodingSnafu)?;
        if fields.len() != self.header_len {
            return Err(EncodingError::FieldCountMismatch {
                expected: self.header_len,
                actual: fields.len(),
            })
            .context(EncodingSnafu);
        }

        let bytes = self.format.encode_row(&fields).context(EncodingSnafu)?;
        self.sink.write(&bytes).await.context(SinkSnafu)?;

        self.records_written += 1;
        emit!(RecordsWritten {
            count: 1,
            target: self.destination.stream().to_string(),
        });
        Ok(())
    }

    /// Finish the object.
    ///
    /// With `succeeded`, every buffered byte is uploaded and the object is
    /// committed. If any step fails the upload is aborted and the original
    /// error returned. Without `succeeded`, the upload is aborted.
    pub async fn close(&mut self, succeeded: bool) -> Result<(), WriterError> {
        self.ensure_open("close")?;

        if !succeeded {
            if let Err(e) = self.sink.flush().await {
                debug!(target = %self.destination.stream(), error = %e, "Flush before abort failed");
            }
            let result = self.sink.close().abort().await.context(UploadSnafu);
            self.state = WriterState::Aborted;
            info!(
                target = %self.destination.stream(),
                records = self.records_written,
                "Discarded {}",
                self.destination
            );
            return result;
        }

        match self.commit().await {
            Ok(()) => {
                self.state = WriterState::Committed;
                info!(
                    target = %self.destination.stream(),
                    records = self.records_written,
                    bytes = self.sink.bytes_written(),
                    "Committed {}",
                    self.destination
                );
                Ok(())
            }
            Err(e) => {
                warn!(target = %self.destination.stream(), error = %e, "Commit failed, aborting upload");
                self.abort_quietly().await;
                self.state = WriterState::Aborted;
                Err(e)
            }
        }
    }

    async fn commit(&mut self) -> Result<(), WriterError> {
        self.sink.flush().await.context(SinkSnafu)?;
        self.sink.close().complete().await.context(UploadSnafu)?;
        Ok(())
    }

    async fn abort_quietly(&mut self) {
        if let Err(e) = self.sink.close().abort().await {
            warn!(target = %self.destination.stream(), error = %e, "Failed to abort upload");
        }
    }

    /// Full key of the destination object.
    pub fn object_key(&self) -> &str {
        self.destination.key()
    }

    pub fn destination(&self) -> &DestinationIdentity {
        &self.destination
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

#[async_trait]
impl<F: RowFormat, E: RowEncoder> RecordWriter for TransactionalWriter<F, E> {
    async fn write(&mut self, id: Uuid, record: &Record) -> Result<(), WriterError> {
        TransactionalWriter::write(self, id, record).await
    }

    async fn close(&mut self, succeeded: bool) -> Result<(), WriterError> {
        TransactionalWriter::close(self, succeeded).await
    }

    fn object_key(&self) -> &str {
        TransactionalWriter::object_key(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Flattening;
    use chrono::Utc;
    use serde_json::json;
    use sleet_core::StorageProvider;
    use std::sync::Arc;

    /// Encoder that returns rows of the wrong width for one stream.
    struct RaggedEncoder;

    impl RowEncoder for RaggedEncoder {
        fn header_row(&self) -> Vec<String> {
            vec!["a".to_string(), "b".to_string()]
        }

        fn data_row(&self, _id: Uuid, record: &Record) -> Result<Vec<String>, EncodingError> {
            if record.stream == "ragged" {
                Ok(vec!["only one".to_string()])
            } else {
                Ok(vec!["1".to_string(), "2".to_string()])
            }
        }
    }

    async fn storage() -> StorageProviderRef {
        Arc::new(StorageProvider::for_url("memory://").await.unwrap())
    }

    fn options() -> WriterOptions {
        WriterOptions {
            upload_threads: 1,
            queue_capacity: 1,
            part_size: 64,
            ..Default::default()
        }
    }

    async fn csv_writer(storage: &StorageProviderRef) -> CsvWriter {
        let destination =
            DestinationIdentity::new(storage, None, "users", "_0", "csv", Utc::now());
        let encoder = SheetEncoder::new(Flattening::NoFlattening, None).unwrap();
        CsvWriter::create(storage.clone(), destination, encoder, CsvFormat::new(), &options())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_writes_header_and_rows() {
        let storage = storage().await;
        let mut writer = csv_writer(&storage).await;

        writer
            .write(Uuid::nil(), &Record::new("users", json!({"a": 1})).with_emitted_at(5))
            .await
            .unwrap();
        writer.close(true).await.unwrap();

        assert_eq!(writer.state(), WriterState::Committed);
        assert_eq!(writer.records_written(), 1);

        let body = storage.get(writer.destination().location()).await.unwrap();
        assert_eq!(
            String::from_utf8(body.to_vec()).unwrap(),
            "\"_sleet_record_id\",\"_sleet_emitted_at\",\"_sleet_data\"\r\n\
             \"00000000-0000-0000-0000-000000000000\",\"5\",\"{\"\"a\"\":1}\"\r\n"
        );
    }

    #[tokio::test]
    async fn test_close_false_leaves_no_object() {
        let storage = storage().await;
        let mut writer = csv_writer(&storage).await;

        writer
            .write(Uuid::new_v4(), &Record::new("users", json!({"a": 1})))
            .await
            .unwrap();
        writer.close(false).await.unwrap();

        assert_eq!(writer.state(), WriterState::Aborted);
        let err = storage.get(writer.destination().location()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_usage_errors_after_close() {
        let storage = storage().await;
        let mut writer = csv_writer(&storage).await;
        writer.close(true).await.unwrap();

        let err = writer
            .write(Uuid::new_v4(), &Record::new("users", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WriterError::Usage {
                operation: "write",
                state: WriterState::Committed
            }
        ));

        let err = writer.close(false).await.unwrap_err();
        assert!(matches!(err, WriterError::Usage { operation: "close", .. }));
        assert_eq!(writer.state(), WriterState::Committed);
    }

    #[tokio::test]
    async fn test_field_count_mismatch_keeps_writer_open() {
        let storage = storage().await;
        let destination = DestinationIdentity::new(&storage, None, "t", "_0", "csv", Utc::now());
        let mut writer = TransactionalWriter::create(
            storage.clone(),
            destination,
            RaggedEncoder,
            CsvFormat::new(),
            &options(),
        )
        .await
        .unwrap();

        let err = writer
            .write(Uuid::new_v4(), &Record::new("ragged", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WriterError::Encoding {
                source: EncodingError::FieldCountMismatch {
                    expected: 2,
                    actual: 1
                }
            }
        ));
        assert_eq!(writer.state(), WriterState::Open);

        writer
            .write(Uuid::new_v4(), &Record::new("fine", json!({})))
            .await
            .unwrap();
        writer.close(true).await.unwrap();

        let body = storage.get(writer.destination().location()).await.unwrap();
        assert_eq!(body.as_ref(), b"\"a\",\"b\"\r\n\"1\",\"2\"\r\n");
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let storage = storage().await;
        let destination = DestinationIdentity::new(&storage, None, "t", "_0", "csv", Utc::now());
        let options = WriterOptions {
            queue_capacity: 0,
            ..Default::default()
        };

        let result = CsvWriter::create(
            storage,
            destination,
            SheetEncoder::new(Flattening::NoFlattening, None).unwrap(),
            CsvFormat::new(),
            &options,
        )
        .await;
        assert!(matches!(result, Err(WriterError::InvalidOptions { .. })));
    }

    #[tokio::test]
    async fn test_record_writer_trait_object() {
        let storage = storage().await;
        let mut writer: Box<dyn RecordWriter> = Box::new(csv_writer(&storage).await);

        writer
            .write(Uuid::new_v4(), &Record::new("users", json!({"x": true})))
            .await
            .unwrap();
        writer.close(true).await.unwrap();
        assert!(writer.object_key().starts_with("users/"));
        assert!(writer.object_key().ends_with("_0.csv"));
    }
}
