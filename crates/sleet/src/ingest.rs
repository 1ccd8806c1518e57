//! NDJSON ingestion driver.
//!
//! Reads one JSON payload per line, writes every record through a
//! [`CsvWriter`] and commits the object once the input is exhausted. Any
//! error aborts the upload.

use chrono::Utc;
use futures::TryStreamExt;
use snafu::prelude::*;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};
use uuid::Uuid;

use sleet_core::{StorageProvider, StorageProviderRef};

use crate::config::{Config, SyncMode};
use crate::error::{
    EncoderSnafu, PipelineError, ReadInputSnafu, RecordParseSnafu, StorageSnafu, WriterSnafu,
};
use crate::naming::{DestinationIdentity, output_prefix};
use crate::record::Record;
use crate::writer::{CsvFormat, CsvWriter, RowFormat};

/// Outcome of a committed ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub records: u64,
    pub object_key: String,
}

/// Build the storage provider for the configured destination.
pub async fn storage_for(config: &Config) -> Result<StorageProviderRef, PipelineError> {
    let storage = StorageProvider::for_url_with_options(
        &config.destination.url,
        config.destination.storage_options.clone(),
    )
    .await
    .context(StorageSnafu)?;
    Ok(Arc::new(storage))
}

/// Delete every object under the stream's output prefix.
pub async fn clear_stream(
    storage: &StorageProvider,
    namespace: Option<&str>,
    stream: &str,
) -> Result<usize, PipelineError> {
    let prefix = output_prefix(namespace, stream);
    let existing: Vec<_> = storage
        .list_with_prefix(&prefix)
        .try_collect()
        .await
        .context(StorageSnafu)?;

    for path in &existing {
        storage.delete(path).await.context(StorageSnafu)?;
    }

    info!(target = %stream, deleted = existing.len(), "Cleared existing objects under {prefix}");
    Ok(existing.len())
}

/// Write every NDJSON line of `input` to a new object and commit it.
pub async fn run<R>(
    config: &Config,
    storage: StorageProviderRef,
    input: R,
    input_name: &str,
) -> Result<IngestSummary, PipelineError>
where
    R: AsyncBufRead + Unpin,
{
    let stream = &config.stream;
    let namespace = stream.namespace.as_deref();

    if stream.sync_mode == SyncMode::Overwrite {
        clear_stream(&storage, namespace, &stream.name).await?;
    }

    let encoder = config.encoder().context(EncoderSnafu)?;
    let format = CsvFormat::new();
    let options = config.writer_options();
    let destination = DestinationIdentity::new(
        &storage,
        namespace,
        &stream.name,
        &options.custom_suffix,
        format.extension(),
        Utc::now(),
    );

    let mut writer = CsvWriter::create(storage, destination, encoder, format, &options)
        .await
        .context(WriterSnafu)?;

    if let Err(e) = write_lines(&mut writer, config, input, input_name).await {
        if let Err(abort_err) = writer.close(false).await {
            warn!(target = %stream.name, error = %abort_err, "Failed to abort upload");
        }
        return Err(e);
    }

    writer.close(true).await.context(WriterSnafu)?;

    Ok(IngestSummary {
        records: writer.records_written(),
        object_key: writer.object_key().to_string(),
    })
}

async fn write_lines<R>(
    writer: &mut CsvWriter,
    config: &Config,
    input: R,
    input_name: &str,
) -> Result<(), PipelineError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut line_number = 0usize;

    while let Some(line) = lines
        .next_line()
        .await
        .context(ReadInputSnafu { path: input_name })?
    {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let data = serde_json::from_str(&line).context(RecordParseSnafu { line: line_number })?;
        let record = Record::new(config.stream.name.as_str(), data)
            .with_namespace(config.stream.namespace.clone());

        writer
            .write(Uuid::new_v4(), &record)
            .await
            .context(WriterSnafu)?;
    }
    Ok(())
}
