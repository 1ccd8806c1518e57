//! Parallel part upload.
//!
//! Parts flow through a bounded channel to a fixed pool of worker tasks that
//! share the receiver. `submit` waits while the channel is full, which is the
//! only backpressure the producer sees.
//!
//! Shutdown follows one sequence for both outcomes:
//! 1. The sender is dropped so workers see the channel close
//! 2. Workers drain what is left (discarding it after a failure or abort)
//! 3. Workers are joined
//! 4. Only then is the store asked to complete or abort the upload

use object_store::multipart::PartId;
use object_store::path::Path;
use object_store::{MultipartId, PutResult};
use snafu::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sleet_core::StorageProviderRef;
use sleet_core::emit;
use sleet_core::metrics::events::{
    ActiveMultipartParts, MultipartUploadFinished, PartUploadFailed, PartUploaded,
    UploadOutcome, UploadQueueDepth,
};

use super::Part;
use crate::config::WriterOptions;
use crate::error::{
    AbortSnafu, FinalizeSnafu, MissingPartsSnafu, OpenSessionSnafu, QueueClosedSnafu,
    SessionClosedSnafu, SinkError, UploadError, WorkerJoinSnafu,
};

/// Global count of in-flight part uploads across all writers.
static ACTIVE_PARTS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Open,
    Completed,
    Aborted,
}

impl SessionStatus {
    fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Completed => "completed",
            SessionStatus::Aborted => "aborted",
        }
    }
}

/// The multipart upload the workers write into.
struct Session {
    storage: StorageProviderRef,
    location: Path,
    id: MultipartId,
    target: String,
}

/// State shared between the uploader and its workers.
#[derive(Default)]
struct UploadState {
    completed: Mutex<Vec<(usize, PartId)>>,
    failure: Mutex<Option<UploadError>>,
    failed: AtomicBool,
    aborting: AtomicBool,
}

impl UploadState {
    fn should_skip(&self) -> bool {
        self.failed.load(Ordering::Acquire) || self.aborting.load(Ordering::Acquire)
    }

    async fn record_failure(&self, error: UploadError) {
        self.failed.store(true, Ordering::Release);
        let mut failure = self.failure.lock().await;
        if failure.is_none() {
            *failure = Some(error);
        }
    }
}

/// Uploads parts of a single multipart upload from a pool of worker tasks.
pub struct PartUploader {
    session: Arc<Session>,
    state: Arc<UploadState>,
    tx: Option<mpsc::Sender<Part>>,
    workers: Vec<JoinHandle<()>>,
    submitted: usize,
    status: SessionStatus,
}

impl PartUploader {
    /// Open a multipart upload at `location` and spawn the upload workers.
    pub async fn start(
        storage: StorageProviderRef,
        location: Path,
        options: &WriterOptions,
        target: String,
    ) -> Result<Self, UploadError> {
        let id = storage
            .create_multipart(&location)
            .await
            .context(OpenSessionSnafu)?;

        debug!(
            target = %target,
            upload_id = %id,
            threads = options.upload_threads,
            queue_capacity = options.queue_capacity,
            "Opened multipart upload"
        );

        let session = Arc::new(Session {
            storage,
            location,
            id,
            target,
        });
        let state = Arc::new(UploadState::default());

        let (tx, rx) = mpsc::channel(options.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..options.upload_threads)
            .map(|worker| {
                tokio::spawn(Self::run_worker(
                    worker,
                    rx.clone(),
                    session.clone(),
                    state.clone(),
                ))
            })
            .collect();

        Ok(Self {
            session,
            state,
            tx: Some(tx),
            workers,
            submitted: 0,
            status: SessionStatus::Open,
        })
    }

    async fn run_worker(
        worker: usize,
        rx: Arc<Mutex<mpsc::Receiver<Part>>>,
        session: Arc<Session>,
        state: Arc<UploadState>,
    ) {
        loop {
            let part = rx.lock().await.recv().await;
            let Some(part) = part else {
                break;
            };

            if state.should_skip() {
                debug!(target = %session.target, part = part.index, "Discarding queued part");
                continue;
            }

            let index = part.index;
            let bytes = part.data.len();

            let active = ACTIVE_PARTS.fetch_add(1, Ordering::Relaxed) + 1;
            emit!(ActiveMultipartParts { count: active });

            let result = session
                .storage
                .put_part(&session.location, &session.id, index, part.data)
                .await;

            let active = ACTIVE_PARTS.fetch_sub(1, Ordering::Relaxed) - 1;
            emit!(ActiveMultipartParts { count: active });

            match result {
                Ok(part_id) => {
                    debug!(target = %session.target, worker, part = index, bytes, "Uploaded part");
                    emit!(PartUploaded {
                        bytes,
                        target: session.target.clone(),
                    });
                    if !state.aborting.load(Ordering::Acquire) {
                        state.completed.lock().await.push((index, part_id));
                    }
                }
                Err(source) => {
                    warn!(target = %session.target, worker, part = index, error = %source, "Failed to upload part");
                    emit!(PartUploadFailed {
                        target: session.target.clone(),
                    });
                    state
                        .record_failure(UploadError::PartUpload { index, source })
                        .await;
                }
            }
        }
    }

    /// Queue a part for upload, waiting while the queue is full.
    pub async fn submit(&mut self, part: Part) -> Result<(), SinkError> {
        let tx = self.tx.as_ref().context(QueueClosedSnafu)?;
        let index = part.index;
        tx.send(part).await.map_err(|_| SinkError::QueueClosed)?;
        self.submitted += 1;

        emit!(UploadQueueDepth {
            count: tx.max_capacity() - tx.capacity(),
            target: self.session.target.clone(),
        });
        debug!(target = %self.session.target, part = index, "Queued part");
        Ok(())
    }

    /// Number of parts accepted into the queue.
    pub fn parts_submitted(&self) -> usize {
        self.submitted
    }

    /// Id of the multipart upload.
    pub fn upload_id(&self) -> &MultipartId {
        &self.session.id
    }

    /// Close the queue and wait for the workers to exit.
    async fn join_workers(&mut self) -> Result<(), UploadError> {
        self.tx.take();

        let mut result = Ok(());
        for handle in std::mem::take(&mut self.workers) {
            if let Err(source) = handle.await
                && result.is_ok()
            {
                result = Err(source).context(WorkerJoinSnafu);
            }
        }
        result
    }

    fn ensure_open(&self) -> Result<(), UploadError> {
        ensure!(
            self.status == SessionStatus::Open,
            SessionClosedSnafu {
                status: self.status.as_str()
            }
        );
        Ok(())
    }

    /// Wait for every queued part and commit the object.
    ///
    /// On error the session stays open so it can still be aborted.
    pub async fn complete(&mut self) -> Result<PutResult, UploadError> {
        self.ensure_open()?;
        self.join_workers().await?;

        if let Some(error) = self.state.failure.lock().await.take() {
            return Err(error);
        }

        let mut parts = std::mem::take(&mut *self.state.completed.lock().await);
        ensure!(
            parts.len() == self.submitted,
            MissingPartsSnafu {
                expected: self.submitted,
                actual: parts.len(),
            }
        );
        parts.sort_by_key(|(index, _)| *index);
        let part_ids = parts.into_iter().map(|(_, part_id)| part_id).collect();

        let session = &self.session;
        let result = session
            .storage
            .complete_multipart(&session.location, &session.id, part_ids)
            .await
            .context(FinalizeSnafu)?;

        self.status = SessionStatus::Completed;
        emit!(MultipartUploadFinished {
            outcome: UploadOutcome::Committed,
            target: session.target.clone(),
        });
        info!(
            target = %session.target,
            parts = self.submitted,
            "Completed multipart upload to {}",
            session.location
        );
        Ok(result)
    }

    /// Discard every uploaded part.
    ///
    /// Queued parts are dropped without upload and in-flight ones are ignored.
    /// Calling this again, or after the store has forgotten the upload, is a no-op.
    pub async fn abort(&mut self) -> Result<(), UploadError> {
        match self.status {
            SessionStatus::Aborted => return Ok(()),
            SessionStatus::Completed => self.ensure_open()?,
            SessionStatus::Open => {}
        }

        self.state.aborting.store(true, Ordering::Release);
        if let Err(e) = self.join_workers().await {
            warn!(target = %self.session.target, error = %e, "Upload worker failed during abort");
        }

        let session = &self.session;
        match session
            .storage
            .abort_multipart(&session.location, &session.id)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(target = %session.target, "Multipart upload already gone");
            }
            Err(source) => return Err(source).context(AbortSnafu),
        }

        self.status = SessionStatus::Aborted;
        emit!(MultipartUploadFinished {
            outcome: UploadOutcome::Aborted,
            target: session.target.clone(),
        });
        info!(target = %session.target, "Aborted multipart upload to {}", session.location);
        Ok(())
    }
}
