//! Internal events for sleet metrics emission.
//!
//! Each event struct represents a measurable occurrence while writing an
//! object. Events carrying a `target` label are tagged with the stream name.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when records are written to an open object.
pub struct RecordsWritten {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for RecordsWritten {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Records written");
        counter!("sleet_records_written_total", "target" => self.target).increment(self.count);
    }
}

/// Event emitted when a part has been accepted by the store.
pub struct PartUploaded {
    pub bytes: usize,
    pub target: String,
}

impl InternalEvent for PartUploaded {
    fn emit(self) {
        trace!(bytes = self.bytes, target = %self.target, "Part uploaded");
        counter!("sleet_parts_uploaded_total", "target" => self.target.clone()).increment(1);
        counter!("sleet_bytes_uploaded_total", "target" => self.target)
            .increment(self.bytes as u64);
    }
}

/// Event emitted when a part upload fails.
pub struct PartUploadFailed {
    pub target: String,
}

impl InternalEvent for PartUploadFailed {
    fn emit(self) {
        trace!(target = %self.target, "Part upload failed");
        counter!("sleet_part_upload_failures_total", "target" => self.target).increment(1);
    }
}

/// Event emitted when the number of parts waiting in the upload queue changes.
pub struct UploadQueueDepth {
    pub count: usize,
    pub target: String,
}

impl InternalEvent for UploadQueueDepth {
    fn emit(self) {
        gauge!("sleet_upload_queue_depth", "target" => self.target).set(self.count as f64);
    }
}

/// Event emitted when the number of in-flight part uploads changes.
pub struct ActiveMultipartParts {
    pub count: usize,
}

impl InternalEvent for ActiveMultipartParts {
    fn emit(self) {
        gauge!("sleet_active_multipart_parts").set(self.count as f64);
    }
}

/// How a multipart upload ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Committed,
    Aborted,
}

impl UploadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadOutcome::Committed => "committed",
            UploadOutcome::Aborted => "aborted",
        }
    }
}

/// Event emitted when a multipart upload is committed or aborted.
pub struct MultipartUploadFinished {
    pub outcome: UploadOutcome,
    pub target: String,
}

impl InternalEvent for MultipartUploadFinished {
    fn emit(self) {
        trace!(outcome = self.outcome.as_str(), target = %self.target, "Multipart upload finished");
        counter!(
            "sleet_multipart_uploads_total",
            "outcome" => self.outcome.as_str(),
            "target" => self.target
        )
        .increment(1);
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
    Delete,
    List,
    CreateMultipart,
    PutPart,
    CompleteMultipart,
    AbortMultipart,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::Delete => "delete",
            StorageOperation::List => "list",
            StorageOperation::CreateMultipart => "create_multipart",
            StorageOperation::PutPart => "put_part",
            StorageOperation::CompleteMultipart => "complete_multipart",
            StorageOperation::AbortMultipart => "abort_multipart",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "sleet_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        histogram!(
            "sleet_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
