//! Multi-cloud storage abstraction.
//!
//! Provides a unified interface over S3, GCS, Azure Blob Storage, the local
//! filesystem and an in-memory store. Every backend exposes part-addressed
//! multipart uploads so parts can be uploaded in parallel and out of order.

mod azure;
mod gcs;
mod local;
mod memory;
mod s3;
mod url_parser;

pub use azure::AzureConfig;
pub use gcs::GcsConfig;
pub use local::{LocalConfig, LocalMultipartStore};
pub use memory::MemoryConfig;
pub use s3::S3Config;
pub use url_parser::BackendConfig;

use bytes::Bytes;
use futures::{Stream, StreamExt, future::ready};
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path;
use object_store::{MultipartId, ObjectStore, PutPayload, PutResult};
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::emit;
use crate::error::{ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider that abstracts over different cloud storage backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) multipart_store: Arc<dyn MultipartStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

/// Record request count and latency for a finished storage call.
fn record<T, E>(operation: StorageOperation, start: Instant, result: &Result<T, E>) {
    emit!(StorageRequest {
        operation,
        status: RequestStatus::from_result(result),
    });
    emit!(StorageRequestDuration {
        operation,
        duration: start.elapsed(),
    });
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::S3(config) => Self::construct_s3(config, options).await,
            BackendConfig::Gcs(config) => Self::construct_gcs(config).await,
            BackendConfig::Azure(config) => Self::construct_azure(config).await,
            BackendConfig::Local(config) => Self::construct_local(config).await,
            BackendConfig::Memory(config) => Ok(Self::construct_memory(config)),
        }
    }

    /// Create a storage provider for the given URL.
    pub async fn for_url(url: &str) -> Result<Self, StorageError> {
        Self::for_url_with_options(url, HashMap::new()).await
    }

    /// Create a storage provider over caller-supplied stores.
    ///
    /// Used to put instrumented or fault-injecting stores behind the provider.
    pub fn with_stores(
        config: BackendConfig,
        object_store: Arc<dyn ObjectStore>,
        multipart_store: Arc<dyn MultipartStore>,
    ) -> Self {
        let canonical_url = format!("custom://{}", config.container());
        Self {
            config,
            object_store,
            multipart_store,
            canonical_url,
        }
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Canonical URL of the storage root, for logging.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Get the contents of a file.
    pub async fn get(&self, path: &Path) -> Result<Bytes, StorageError> {
        let start = Instant::now();
        let result = self.object_store.get(&self.qualify_path(path)).await;
        record(StorageOperation::Get, start, &result);

        result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)
    }

    /// Put a payload to a path.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = self.object_store.put(&self.qualify_path(path), payload).await;
        record(StorageOperation::Put, start, &result);

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Delete a file at the given path.
    pub async fn delete(&self, path: &Path) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = self.object_store.delete(&self.qualify_path(path)).await;
        record(StorageOperation::Delete, start, &result);

        result.context(ObjectStoreSnafu)
    }

    /// List files under a prefix (relative to the configured key prefix).
    ///
    /// Returns paths relative to the configured key prefix.
    pub fn list_with_prefix(
        &self,
        prefix: &Path,
    ) -> impl Stream<Item = Result<Path, StorageError>> + '_ {
        emit!(StorageRequest {
            operation: StorageOperation::List,
            status: RequestStatus::Success,
        });

        let full_prefix = self.qualify_path(prefix).into_owned();
        let key_part_count = self
            .config
            .key()
            .map(|key| key.parts().count())
            .unwrap_or_default();

        self.object_store
            .list(Some(&full_prefix))
            .map(move |meta| {
                let meta = meta.context(ObjectStoreSnafu)?;
                Ok(meta.location.parts().skip(key_part_count).collect())
            })
            .filter(|result: &Result<Path, StorageError>| {
                // A missing prefix lists as empty.
                ready(!matches!(result, Err(e) if e.is_not_found()))
            })
    }

    /// Start a multipart upload for `path`.
    pub async fn create_multipart(&self, path: &Path) -> Result<MultipartId, StorageError> {
        let start = Instant::now();
        let result = self
            .multipart_store
            .create_multipart(&self.qualify_path(path))
            .await;
        record(StorageOperation::CreateMultipart, start, &result);

        result.context(ObjectStoreSnafu)
    }

    /// Upload part `part_idx` (0-based) of a multipart upload.
    ///
    /// Parts may be uploaded concurrently and in any order.
    pub async fn put_part(
        &self,
        path: &Path,
        id: &MultipartId,
        part_idx: usize,
        data: Bytes,
    ) -> Result<PartId, StorageError> {
        let start = Instant::now();
        let result = self
            .multipart_store
            .put_part(&self.qualify_path(path), id, part_idx, data.into())
            .await;
        record(StorageOperation::PutPart, start, &result);

        result.context(ObjectStoreSnafu)
    }

    /// Complete a multipart upload. `parts` must be ordered by part index.
    pub async fn complete_multipart(
        &self,
        path: &Path,
        id: &MultipartId,
        parts: Vec<PartId>,
    ) -> Result<PutResult, StorageError> {
        let start = Instant::now();
        let result = self
            .multipart_store
            .complete_multipart(&self.qualify_path(path), id, parts)
            .await;
        record(StorageOperation::CompleteMultipart, start, &result);

        result.context(ObjectStoreSnafu)
    }

    /// Abort a multipart upload, discarding every uploaded part.
    pub async fn abort_multipart(&self, path: &Path, id: &MultipartId) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = self
            .multipart_store
            .abort_multipart(&self.qualify_path(path), id)
            .await;
        record(StorageOperation::AbortMultipart, start, &result);

        result.context(ObjectStoreSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_multipart_roundtrip_with_key_prefix() {
        let storage = StorageProvider::for_url("memory://exports").await.unwrap();
        let path = Path::from("users/out.csv");

        let id = storage.create_multipart(&path).await.unwrap();
        let p0 = storage
            .put_part(&path, &id, 0, Bytes::from_static(b"a"))
            .await
            .unwrap();
        let p1 = storage
            .put_part(&path, &id, 1, Bytes::from_static(b"b"))
            .await
            .unwrap();
        storage
            .complete_multipart(&path, &id, vec![p0, p1])
            .await
            .unwrap();

        assert_eq!(storage.get(&path).await.unwrap().as_ref(), b"ab");
        assert_eq!(
            storage.qualify_path(&path).as_ref(),
            &Path::from("exports/users/out.csv")
        );
    }

    #[tokio::test]
    async fn test_list_with_prefix_returns_relative_paths() {
        let storage = StorageProvider::for_url("memory://exports").await.unwrap();
        for name in ["users/a.csv", "users/b.csv", "orders/c.csv"] {
            storage
                .put_payload(&Path::from(name), PutPayload::from_static(b"x"))
                .await
                .unwrap();
        }

        let mut listed: Vec<String> = storage
            .list_with_prefix(&Path::from("users"))
            .map_ok(|p| p.to_string())
            .try_collect()
            .await
            .unwrap();
        listed.sort();

        assert_eq!(listed, vec!["users/a.csv", "users/b.csv"]);
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageProvider::for_url(temp_dir.path().to_str().unwrap())
            .await
            .unwrap();

        let listed: Vec<Path> = storage
            .list_with_prefix(&Path::from("missing"))
            .try_collect()
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_local_multipart_through_provider() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageProvider::for_url(temp_dir.path().to_str().unwrap())
            .await
            .unwrap();
        let path = Path::from("users/out.csv");

        let id = storage.create_multipart(&path).await.unwrap();
        let p0 = storage
            .put_part(&path, &id, 0, Bytes::from_static(b"id,name\r\n"))
            .await
            .unwrap();
        storage.complete_multipart(&path, &id, vec![p0]).await.unwrap();

        assert_eq!(
            std::fs::read(temp_dir.path().join("users/out.csv")).unwrap(),
            b"id,name\r\n"
        );
        assert_eq!(storage.get(&path).await.unwrap().as_ref(), b"id,name\r\n");
    }

    #[tokio::test]
    async fn test_canonical_url() {
        let storage = StorageProvider::for_url("memory://exports").await.unwrap();
        assert_eq!(storage.canonical_url(), "memory://exports");
        assert_eq!(format!("{storage:?}"), "StorageProvider<memory://exports>");

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_str().unwrap();
        let storage = StorageProvider::for_url(root).await.unwrap();
        assert_eq!(storage.canonical_url(), format!("file://{root}"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let storage = StorageProvider::for_url("memory://").await.unwrap();
        let err = storage.get(&Path::from("nope.csv")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
