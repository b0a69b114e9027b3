use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::RwLock;

use crate::{BlobStore, ByteStream, PutResult, UploadResult};

/// In-memory blob store for development and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents stored at `path`, if any
    pub async fn get(&self, path: &str) -> Option<Bytes> {
        self.blobs.read().await.get(path).cloned()
    }

    /// All stored paths, sorted
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write_stream(&self, path: &str, mut stream: ByteStream) -> UploadResult<PutResult> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let size_bytes = buf.len() as u64;
        self.blobs
            .write()
            .await
            .insert(path.to_string(), buf.freeze());
        Ok(PutResult {
            path: path.to_string(),
            size_bytes,
        })
    }

    async fn exists(&self, path: &str) -> UploadResult<bool> {
        Ok(self.blobs.read().await.contains_key(path))
    }

    async fn delete(&self, path: &str) -> UploadResult<()> {
        self.blobs.write().await.remove(path);
        Ok(())
    }
}
