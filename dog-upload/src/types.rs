use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tempfile::TempPath;

/// Stream of bytes for file content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Identifier of a chunked upload session, safe to use as a directory name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkSessionId(pub String);

impl ChunkSessionId {
    /// Derive a session id from client-supplied parts (handler, identifier, session token)
    pub fn derive(parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChunkSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file sitting in temporary storage: a whole upload, one chunk, or an assembled chunk session.
///
/// The file is removed when the handle is dropped unless it was moved with [`UploadedFile::keep`].
#[derive(Debug)]
pub struct UploadedFile {
    temp: TempPath,
    size: u64,
    client_original_name: String,
    content_type: Option<String>,
}

impl UploadedFile {
    /// Take ownership of an existing temporary file
    pub fn new<P: Into<PathBuf>, S: Into<String>>(path: P, size: u64, client_original_name: S) -> Self {
        Self {
            temp: TempPath::from_path(path),
            size,
            client_original_name: client_original_name.into(),
            content_type: None,
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn real_path(&self) -> &Path {
        &self.temp
    }

    pub fn client_original_name(&self) -> &str {
        &self.client_original_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Lower-cased extension of the client name, if any
    pub fn client_extension(&self) -> Option<String> {
        Path::new(&self.client_original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// Stop tracking the file; the caller becomes responsible for it
    pub fn keep(self) -> std::io::Result<PathBuf> {
        self.temp.keep().map_err(|e| e.error)
    }

    /// Remove the file from temporary storage.
    ///
    /// A file that is already gone (moved by the store) is not an error.
    pub fn discard(self) -> std::io::Result<()> {
        match self.temp.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Progress of an unfinished chunk session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkProgress {
    /// Chunks (or bytes for content-range sessions) stored so far
    pub received: u64,
    pub total: u64,
}

impl ChunkProgress {
    pub fn new(received: u64, total: u64) -> Self {
        Self { received, total }
    }

    /// Percentage in `[0, 100]`; only a complete session reports 100
    pub fn percentage_done(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let pct = self.received as f64 / self.total as f64 * 100.0;
        if self.received < self.total {
            pct.min(99.99)
        } else {
            100.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.received >= self.total
    }
}

/// Outcome of receiving one request's payload
#[derive(Debug)]
pub enum ChunkSave {
    /// The whole file is available
    Finished(UploadedFile),
    /// More chunks are expected
    InProgress(ChunkProgress),
}

impl ChunkSave {
    pub fn is_finished(&self) -> bool {
        matches!(self, ChunkSave::Finished(_))
    }

    /// The assembled file, present iff finished
    pub fn file(&self) -> Option<&UploadedFile> {
        match self {
            ChunkSave::Finished(file) => Some(file),
            ChunkSave::InProgress(_) => None,
        }
    }

    /// The progress handle, present iff not finished
    pub fn handler(&self) -> Option<&ChunkProgress> {
        match self {
            ChunkSave::Finished(_) => None,
            ChunkSave::InProgress(progress) => Some(progress),
        }
    }
}

/// Where a chunk belongs inside its file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkPosition {
    /// 1-based chunk number out of `total` chunks
    Indexed { number: u32, total: u32 },
    /// Inclusive byte range out of `total` bytes
    Range { start: u64, end: u64, total: u64 },
}

impl ChunkPosition {
    /// Key a part file is stored under; orders parts within the file
    pub fn part_key(&self) -> u64 {
        match self {
            ChunkPosition::Indexed { number, .. } => u64::from(*number),
            ChunkPosition::Range { start, .. } => *start,
        }
    }

    pub fn total(&self) -> u64 {
        match self {
            ChunkPosition::Indexed { total, .. } => u64::from(*total),
            ChunkPosition::Range { total, .. } => *total,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, ChunkPosition::Range { .. })
    }
}

/// One chunk as described by the client's upload library
#[derive(Debug, Clone)]
pub struct ChunkPart {
    pub session: ChunkSessionId,
    pub position: ChunkPosition,
    /// Name of the whole file, used for the assembled result
    pub original_name: String,
    pub content_type: Option<String>,
}
