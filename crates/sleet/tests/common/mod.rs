//! Shared test helpers.
//!
//! `ScriptedStore` is a multipart store whose parts can be delayed or made to
//! fail. Completed objects land in an `InMemory` store readable through the
//! provider built by [`ScriptedStore::provider`].

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path;
use object_store::{MultipartId, ObjectStore, PutPayload, PutResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sleet::storage::{BackendConfig, MemoryConfig};
use sleet::{StorageProvider, StorageProviderRef};

#[derive(Debug)]
struct ScriptError(String);

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ScriptError {}

fn generic(message: impl Into<String>) -> object_store::Error {
    object_store::Error::Generic {
        store: "Scripted",
        source: Box::new(ScriptError(message.into())),
    }
}

pub struct ScriptedStore {
    objects: Arc<InMemory>,
    uploads: Mutex<HashMap<MultipartId, BTreeMap<usize, Bytes>>>,
    next_id: AtomicUsize,
    delays: HashMap<usize, Duration>,
    fail_part: Option<usize>,
    fail_complete: bool,
    /// Part indices in the order their uploads finished.
    completion_order: Mutex<Vec<usize>>,
    aborts: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(InMemory::new()),
            uploads: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
            delays: HashMap::new(),
            fail_part: None,
            fail_complete: false,
            completion_order: Mutex::new(Vec::new()),
            aborts: AtomicUsize::new(0),
        }
    }

    /// Delay the upload of `part` by `delay`.
    pub fn delay_part(mut self, part: usize, delay: Duration) -> Self {
        self.delays.insert(part, delay);
        self
    }

    /// Reject the upload of `part`.
    pub fn fail_part(mut self, part: usize) -> Self {
        self.fail_part = Some(part);
        self
    }

    /// Reject every complete call, leaving the upload open.
    pub fn fail_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    pub fn provider(self: &Arc<Self>) -> StorageProviderRef {
        Arc::new(StorageProvider::with_stores(
            BackendConfig::Memory(MemoryConfig { key: None }),
            self.objects.clone() as Arc<dyn ObjectStore>,
            self.clone() as Arc<dyn MultipartStore>,
        ))
    }

    pub fn completion_order(&self) -> Vec<usize> {
        self.completion_order.lock().unwrap().clone()
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    pub fn open_uploads(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

impl std::fmt::Debug for ScriptedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ScriptedStore")
    }
}

#[async_trait]
impl MultipartStore for ScriptedStore {
    async fn create_multipart(&self, _path: &Path) -> object_store::Result<MultipartId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.uploads
            .lock()
            .unwrap()
            .insert(id.clone(), BTreeMap::new());
        Ok(id)
    }

    async fn put_part(
        &self,
        _path: &Path,
        id: &MultipartId,
        part_idx: usize,
        data: PutPayload,
    ) -> object_store::Result<PartId> {
        if let Some(delay) = self.delays.get(&part_idx) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_part == Some(part_idx) {
            return Err(generic(format!("part {part_idx} rejected")));
        }

        let bytes: Bytes = data.into();
        {
            let mut uploads = self.uploads.lock().unwrap();
            let parts = uploads
                .get_mut(id)
                .ok_or_else(|| generic(format!("unknown upload {id}")))?;
            parts.insert(part_idx, bytes);
        }
        self.completion_order.lock().unwrap().push(part_idx);

        Ok(PartId {
            content_id: part_idx.to_string(),
        })
    }

    async fn complete_multipart(
        &self,
        path: &Path,
        id: &MultipartId,
        parts: Vec<PartId>,
    ) -> object_store::Result<PutResult> {
        if self.fail_complete {
            return Err(generic(format!("complete of upload {id} rejected")));
        }

        let uploaded = self
            .uploads
            .lock()
            .unwrap()
            .remove(id)
            .ok_or_else(|| generic(format!("unknown upload {id}")))?;

        let mut body = Vec::new();
        for part in &parts {
            let index: usize = part
                .content_id
                .parse()
                .map_err(|_| generic("bad part id"))?;
            let bytes = uploaded
                .get(&index)
                .ok_or_else(|| generic(format!("missing part {index}")))?;
            body.extend_from_slice(bytes);
        }

        self.objects.put(path, PutPayload::from(body)).await
    }

    async fn abort_multipart(&self, path: &Path, id: &MultipartId) -> object_store::Result<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        match self.uploads.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(object_store::Error::NotFound {
                path: path.to_string(),
                source: Box::new(ScriptError(format!("unknown upload {id}"))),
            }),
        }
    }
}

/// Parse a CSV object into rows.
pub fn parse_csv(body: &[u8]) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(body)
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}
