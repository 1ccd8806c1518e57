//! Chunked multipart upload machinery.
//!
//! [`ChunkedUploadSink`] cuts the serialized byte stream into fixed-size
//! parts and hands them to a [`PartUploader`], whose worker tasks upload
//! parts in parallel while the producer keeps writing.

mod chunked;
mod uploader;

pub use chunked::ChunkedUploadSink;
pub use uploader::PartUploader;

use bytes::Bytes;

/// A sealed chunk of the output stream.
#[derive(Debug, Clone)]
pub struct Part {
    /// 0-based position of the part in the object.
    pub index: usize,
    pub data: Bytes,
}
