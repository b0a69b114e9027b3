use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::io::ReaderStream;

use crate::path::join_destination;
use crate::{ByteStream, UploadError, UploadResult};

/// Storage primitives a finished upload is written through.
///
/// Writes must be durable when the returned future resolves.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a stream to `path`, replacing anything stored there
    async fn write_stream(&self, path: &str, stream: ByteStream) -> UploadResult<PutResult>;

    /// Store a local file under `folder/name`, consuming the source file.
    /// Returns the resolved path.
    async fn put_file_as(&self, folder: &str, source: &Path, name: &str) -> UploadResult<String> {
        let path = join_destination(folder, name);
        let file = tokio::fs::File::open(source).await?;
        self.write_stream(&path, Box::pin(ReaderStream::new(file))).await?;
        tokio::fs::remove_file(source).await?;
        Ok(path)
    }

    async fn exists(&self, path: &str) -> UploadResult<bool>;

    async fn delete(&self, path: &str) -> UploadResult<()>;
}

/// Result of a successful write
#[derive(Debug, Clone)]
pub struct PutResult {
    pub path: String,
    pub size_bytes: u64,
}

/// The blob store a request writes to, together with the disk name it was resolved from
#[derive(Clone)]
pub struct StorageManager {
    disk: String,
    filesystem: Arc<dyn BlobStore>,
}

impl StorageManager {
    pub fn new<S: Into<String>>(disk: S, filesystem: Arc<dyn BlobStore>) -> Self {
        Self {
            disk: disk.into(),
            filesystem,
        }
    }

    pub fn filesystem(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.filesystem)
    }

    pub fn disk(&self) -> &str {
        &self.disk
    }
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("disk", &self.disk)
            .finish_non_exhaustive()
    }
}

/// Named disks an upload may target
#[derive(Clone)]
pub struct DiskRegistry {
    default_disk: String,
    disks: HashMap<String, Arc<dyn BlobStore>>,
}

impl DiskRegistry {
    /// Create a registry whose default disk is `name`
    pub fn new<S: Into<String>>(name: S, store: Arc<dyn BlobStore>) -> Self {
        let name = name.into();
        let mut disks = HashMap::new();
        disks.insert(name.clone(), store);
        Self {
            default_disk: name,
            disks,
        }
    }

    pub fn with_disk<S: Into<String>>(mut self, name: S, store: Arc<dyn BlobStore>) -> Self {
        self.disks.insert(name.into(), store);
        self
    }

    pub fn default_disk(&self) -> &str {
        &self.default_disk
    }

    /// Resolve a disk by name; `None` selects the default disk
    pub fn manager(&self, disk: Option<&str>) -> UploadResult<StorageManager> {
        let name = disk.unwrap_or(&self.default_disk);
        self.disks
            .get(name)
            .map(|store| StorageManager::new(name, Arc::clone(store)))
            .ok_or_else(|| {
                UploadError::validation(
                    "errors.disk.unknown",
                    format!("Unknown disk '{}'", name),
                )
            })
    }
}
