use std::sync::Arc;

use tokio::sync::broadcast;

use crate::BlobStore;

/// Upload lifecycle event names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadEventKind {
    /// About to write the file to the blob store
    Uploading,
    /// The file is durably stored
    Uploaded,
}

impl UploadEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            UploadEventKind::Uploading => "uploading",
            UploadEventKind::Uploaded => "uploaded",
        }
    }
}

/// A lifecycle notification for one file
#[derive(Clone)]
pub struct UploadEvent {
    pub kind: UploadEventKind,
    pub filesystem: Arc<dyn BlobStore>,
    pub disk: String,
    pub path: String,
}

impl UploadEvent {
    pub fn uploading(filesystem: Arc<dyn BlobStore>, disk: &str, path: &str) -> Self {
        Self::new(UploadEventKind::Uploading, filesystem, disk, path)
    }

    pub fn uploaded(filesystem: Arc<dyn BlobStore>, disk: &str, path: &str) -> Self {
        Self::new(UploadEventKind::Uploaded, filesystem, disk, path)
    }

    fn new(kind: UploadEventKind, filesystem: Arc<dyn BlobStore>, disk: &str, path: &str) -> Self {
        Self {
            kind,
            filesystem,
            disk: disk.to_string(),
            path: path.to_string(),
        }
    }
}

impl std::fmt::Debug for UploadEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadEvent")
            .field("kind", &self.kind)
            .field("disk", &self.disk)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Fire-and-forget notification port. Implementations must not block.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: UploadEvent);
}

/// Any `Fn(UploadEvent)` closure is a publisher
impl<F> EventPublisher for F
where
    F: Fn(UploadEvent) + Send + Sync,
{
    fn publish(&self, event: UploadEvent) {
        self(event)
    }
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: UploadEvent) {}
}

/// Publishes onto a tokio broadcast channel. Events sent with no subscriber are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<UploadEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: UploadEvent) {
        tracing::trace!(event = event.kind.name(), path = %event.path, "publishing upload event");
        let _ = self.sender.send(event);
    }
}
