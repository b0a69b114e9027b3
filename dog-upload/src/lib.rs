//! # dog-upload: chunked and resumable uploads for DogRS applications
//!
//! `dog-upload` takes an upload request whose file arrives either whole or as a
//! sequence of chunks, assembles it, and persists the finished file to a blob
//! store while publishing lifecycle events.
//!
//! ## Key Features
//!
//! - **Client-library aware**: resumable.js, Dropzone, `Content-Range` and
//!   plupload-style chunking are detected from the request itself
//! - **Idempotent chunks**: re-sent chunks overwrite their earlier copy; progress never goes backwards
//! - **Streaming persistence**: finished files are streamed to the store in bounded buffers
//! - **Guaranteed cleanup**: temporary files are removed on every exit path
//! - **Storage agnostic**: anything implementing [`BlobStore`] can be the destination
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dog_upload::prelude::*;
//!
//! # async fn run(file: UploadedFile) -> UploadResult<()> {
//! let disks = DiskRegistry::new("public", Arc::new(LocalBlobStore::new("/srv/files")));
//! let uploader = Uploader::new(UploadConfig::default())
//!     .with_events(|event: UploadEvent| println!("{} {}", event.kind.name(), event.path));
//!
//! let request = UploadRequest::new(disks.manager(None)?)
//!     .with_file_path("/docs/report.pdf")
//!     .with_file("file", file);
//!
//! match uploader.handle(request, "file").await? {
//!     UploadResponse::Progress { done, .. } => println!("{done}% received"),
//!     UploadResponse::Complete { message } => println!("{message}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │           Uploader           │  ← one call per request
//! ├──────────────┬───────────────┤
//! │ FileReceiver │  Completion   │
//! ├──────────────┼───────────────┤
//! │  ChunkStore  │   BlobStore   │  ← scratch sessions / final storage
//! └──────────────┴───────────────┘
//! ```

mod completion;
mod config;
mod error;
mod events;
pub mod handler;
mod local_store;
mod memory_store;
pub mod path;
mod receipt;
mod receiver;
mod request;
mod session_store;
pub mod store;
mod types;
mod upload;
mod uploader;

// Re-export main types for clean API
pub use completion::UploadCompletionHandler;
pub use config::{
    OverwritePolicy, PersistStrategy, UploadConfig, UploadMessages, UploadRules,
    ERR_EXTENSION, ERR_FILE_TOO_LARGE, ERR_INVALID_PATH, ERR_UPLOAD_VALIDATION, MSG_UPLOADED,
};
pub use error::{UploadError, UploadResult};
pub use events::{BroadcastPublisher, EventPublisher, NoopPublisher, UploadEvent, UploadEventKind};
pub use handler::HandlerKind;
pub use local_store::LocalBlobStore;
pub use memory_store::MemoryBlobStore;
pub use receipt::{UploadReceipt, UploadResponse};
pub use receiver::FileReceiver;
pub use request::UploadRequest;
pub use session_store::DiskChunkStore;
pub use store::{BlobStore, DiskRegistry, PutResult, StorageManager};
pub use types::{
    ByteStream, ChunkPart, ChunkPosition, ChunkProgress, ChunkSave, ChunkSessionId, UploadedFile,
};
pub use upload::{ChunkStore, RulesValidator, UploadValidator};
pub use uploader::Uploader;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobStore, DiskRegistry, LocalBlobStore, UploadConfig, UploadError, UploadEvent,
        UploadRequest, UploadResponse, UploadResult, UploadedFile, Uploader,
    };
}
