#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dog_upload::{
    BlobStore, ByteStream, DiskRegistry, MemoryBlobStore, PutResult, StorageManager, UploadConfig,
    UploadError, UploadEvent, UploadEventKind, UploadRequest, UploadResult, UploadedFile, Uploader,
};
use tempfile::TempDir;

pub const CLIENT: &str = "client-a";

/// Scratch directories for one test: incoming request files and chunk sessions
pub struct Fixture {
    pub incoming: TempDir,
    pub chunks: TempDir,
    pub store: MemoryBlobStore,
    pub events: Arc<Mutex<Vec<(UploadEventKind, String)>>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            incoming: tempfile::tempdir().unwrap(),
            chunks: tempfile::tempdir().unwrap(),
            store: MemoryBlobStore::new(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn config(&self) -> UploadConfig {
        UploadConfig::new().with_chunk_dir(self.chunks.path())
    }

    pub fn uploader(&self, config: UploadConfig) -> Uploader {
        let events = Arc::clone(&self.events);
        Uploader::new(config).with_events(move |event: UploadEvent| {
            events.lock().unwrap().push((event.kind, event.path));
        })
    }

    pub fn manager(&self) -> StorageManager {
        DiskRegistry::new("public", Arc::new(self.store.clone()))
            .manager(None)
            .unwrap()
    }

    /// Write `content` to a fresh temp file the way the web layer spools a form field
    pub fn file(&self, name: &str, content: &[u8]) -> UploadedFile {
        let path = self
            .incoming
            .path()
            .join(format!("{}-{}", uuid_like(), name));
        std::fs::write(&path, content).unwrap();
        UploadedFile::new(path, content.len() as u64, name)
    }

    /// Request from a single caller; chunk sessions are scoped to `CLIENT`
    pub fn request(&self, file_path: &str) -> UploadRequest {
        UploadRequest::new(self.manager())
            .with_file_path(file_path)
            .with_session(CLIENT)
    }

    pub fn recorded_events(&self) -> Vec<(UploadEventKind, String)> {
        self.events.lock().unwrap().clone()
    }

    /// Files left in the incoming and chunk scratch directories
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_files(self.incoming.path(), &mut found);
        collect_files(self.chunks.path(), &mut found);
        found
    }
}

fn collect_files(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, found);
        } else {
            found.push(path);
        }
    }
}

fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(1);
    format!("upload{}", NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Store whose writes always fail
pub struct FailingStore;

#[async_trait]
impl BlobStore for FailingStore {
    async fn write_stream(&self, _path: &str, _stream: ByteStream) -> UploadResult<PutResult> {
        Err(UploadError::backend(std::io::Error::new(
            std::io::ErrorKind::Other,
            "quota exceeded",
        )))
    }

    async fn put_file_as(&self, _folder: &str, _source: &Path, _name: &str) -> UploadResult<String> {
        Err(UploadError::backend(std::io::Error::new(
            std::io::ErrorKind::Other,
            "quota exceeded",
        )))
    }

    async fn exists(&self, _path: &str) -> UploadResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _path: &str) -> UploadResult<()> {
        Ok(())
    }
}
