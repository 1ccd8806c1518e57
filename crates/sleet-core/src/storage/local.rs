//! Local filesystem storage backend implementation.
//!
//! `LocalFileSystem` has no part-addressed multipart API, so parts are staged
//! as individual files under `_multipart/<upload id>/` and concatenated into
//! the destination on completion.

use async_trait::async_trait;
use object_store::local::LocalFileSystem;
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path;
use object_store::{MultipartId, ObjectStore, PutPayload, PutResult};
use snafu::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{IoSnafu, ObjectStoreSnafu, StorageError};

use super::{BackendConfig, StorageProvider};

/// Directory under the root where in-progress uploads keep their parts.
const STAGING_DIR: &str = "_multipart";

/// Local filesystem configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub path: String,
}

impl StorageProvider {
    pub(super) async fn construct_local(config: LocalConfig) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&config.path)
            .await
            .context(IoSnafu)?;

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(LocalFileSystem::new_with_prefix(&config.path).context(ObjectStoreSnafu)?);
        let multipart_store: Arc<dyn MultipartStore> =
            Arc::new(LocalMultipartStore::new(&config.path));

        let canonical_url = format!("file://{}", config.path);

        Ok(Self {
            config: BackendConfig::Local(config),
            object_store,
            multipart_store,
            canonical_url,
        })
    }
}

/// Part-addressed multipart uploads on a local directory.
#[derive(Debug, Clone)]
pub struct LocalMultipartStore {
    root: PathBuf,
}

impl LocalMultipartStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn staging_dir(&self, id: &MultipartId) -> PathBuf {
        self.root.join(STAGING_DIR).join(id)
    }

    fn destination(&self, path: &Path) -> PathBuf {
        path.parts()
            .fold(self.root.clone(), |dest, part| dest.join(part.as_ref()))
    }
}

fn to_store_error(source: std::io::Error, path: String) -> object_store::Error {
    if source.kind() == std::io::ErrorKind::NotFound {
        object_store::Error::NotFound {
            path,
            source: Box::new(source),
        }
    } else {
        object_store::Error::Generic {
            store: "LocalMultipart",
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl MultipartStore for LocalMultipartStore {
    async fn create_multipart(&self, path: &Path) -> object_store::Result<MultipartId> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let dir = self.staging_dir(&id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| to_store_error(e, dir.display().to_string()))?;
        debug!(path = %path, id = %id, "Created local multipart staging directory");
        Ok(id)
    }

    async fn put_part(
        &self,
        _path: &Path,
        id: &MultipartId,
        part_idx: usize,
        data: PutPayload,
    ) -> object_store::Result<PartId> {
        let content_id = format!("{part_idx:06}");
        let part_path = self.staging_dir(id).join(&content_id);

        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|e| to_store_error(e, part_path.display().to_string()))?;
        for chunk in data.iter() {
            file.write_all(chunk)
                .await
                .map_err(|e| to_store_error(e, part_path.display().to_string()))?;
        }
        file.sync_all()
            .await
            .map_err(|e| to_store_error(e, part_path.display().to_string()))?;

        Ok(PartId { content_id })
    }

    async fn complete_multipart(
        &self,
        path: &Path,
        id: &MultipartId,
        parts: Vec<PartId>,
    ) -> object_store::Result<PutResult> {
        let staging = self.staging_dir(id);
        let destination = self.destination(path);
        let temp = staging.join("assembled.tmp");

        let io_err = |e: std::io::Error| to_store_error(e, path.to_string());

        let mut assembled = tokio::fs::File::create(&temp).await.map_err(io_err)?;
        for part in &parts {
            let mut part_file = tokio::fs::File::open(staging.join(&part.content_id))
                .await
                .map_err(io_err)?;
            tokio::io::copy(&mut part_file, &mut assembled)
                .await
                .map_err(io_err)?;
        }
        assembled.sync_all().await.map_err(io_err)?;
        drop(assembled);

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::rename(&temp, &destination)
            .await
            .map_err(io_err)?;
        tokio::fs::remove_dir_all(&staging).await.map_err(io_err)?;

        Ok(PutResult {
            e_tag: None,
            version: None,
        })
    }

    async fn abort_multipart(&self, _path: &Path, id: &MultipartId) -> object_store::Result<()> {
        match tokio::fs::remove_dir_all(self.staging_dir(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(to_store_error(e, id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_parts_are_assembled_in_index_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalMultipartStore::new(temp_dir.path());
        let path = Path::from("stream/out.csv");

        let id = store.create_multipart(&path).await.unwrap();
        let second = store
            .put_part(&path, &id, 1, PutPayload::from(Bytes::from_static(b"world")))
            .await
            .unwrap();
        let first = store
            .put_part(&path, &id, 0, PutPayload::from(Bytes::from_static(b"hello ")))
            .await
            .unwrap();

        store
            .complete_multipart(&path, &id, vec![first, second])
            .await
            .unwrap();

        let content = std::fs::read(temp_dir.path().join("stream/out.csv")).unwrap();
        assert_eq!(content, b"hello world");
        assert!(!temp_dir.path().join(STAGING_DIR).join(&id).exists());
    }

    #[tokio::test]
    async fn test_abort_removes_staged_parts_and_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalMultipartStore::new(temp_dir.path());
        let path = Path::from("stream/out.csv");

        let id = store.create_multipart(&path).await.unwrap();
        store
            .put_part(&path, &id, 0, PutPayload::from(Bytes::from_static(b"data")))
            .await
            .unwrap();

        store.abort_multipart(&path, &id).await.unwrap();
        store.abort_multipart(&path, &id).await.unwrap();

        assert!(!temp_dir.path().join(STAGING_DIR).join(&id).exists());
        assert!(!temp_dir.path().join("stream/out.csv").exists());
    }
}
