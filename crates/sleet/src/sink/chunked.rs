//! Fixed-size chunking of the output byte stream.

use bytes::BytesMut;
use snafu::prelude::*;

use super::{Part, PartUploader};
use crate::error::{ClosedSnafu, SinkError};

/// Append-only sink that seals every `part_size` bytes into a [`Part`].
///
/// Only the last part of an object may be shorter than `part_size`.
pub struct ChunkedUploadSink {
    uploader: PartUploader,
    buffer: BytesMut,
    part_size: usize,
    next_index: usize,
    bytes_written: u64,
    closed: bool,
}

impl ChunkedUploadSink {
    pub fn new(uploader: PartUploader, part_size: usize) -> Self {
        Self {
            uploader,
            buffer: BytesMut::new(),
            part_size,
            next_index: 0,
            bytes_written: 0,
            closed: false,
        }
    }

    /// Append bytes, submitting every part that fills up.
    pub async fn write(&mut self, mut data: &[u8]) -> Result<(), SinkError> {
        ensure!(!self.closed, ClosedSnafu);

        while !data.is_empty() {
            let take = (self.part_size - self.buffer.len()).min(data.len());
            let (head, rest) = data.split_at(take);
            self.buffer.extend_from_slice(head);
            self.bytes_written += take as u64;
            data = rest;

            if self.buffer.len() == self.part_size {
                self.seal().await?;
            }
        }
        Ok(())
    }

    /// Submit the buffered bytes as a part even if it is not full.
    ///
    /// An empty buffer is only submitted when nothing has been submitted yet,
    /// so every upload has at least one part.
    pub async fn flush(&mut self) -> Result<(), SinkError> {
        ensure!(!self.closed, ClosedSnafu);

        if !self.buffer.is_empty() || self.next_index == 0 {
            self.seal().await?;
        }
        Ok(())
    }

    async fn seal(&mut self) -> Result<(), SinkError> {
        let part = Part {
            index: self.next_index,
            data: self.buffer.split().freeze(),
        };
        self.next_index += 1;
        self.uploader.submit(part).await
    }

    /// Refuse further writes and hand back the uploader to finish the upload.
    pub fn close(&mut self) -> &mut PartUploader {
        self.closed = true;
        &mut self.uploader
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Uploader behind the sink, for aborting.
    pub fn uploader(&mut self) -> &mut PartUploader {
        &mut self.uploader
    }

    /// Parts sealed so far.
    pub fn parts_sealed(&self) -> usize {
        self.next_index
    }

    /// Bytes accepted by `write`.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
