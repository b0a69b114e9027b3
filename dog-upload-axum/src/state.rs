use std::sync::Arc;

use dog_upload::{DiskRegistry, Uploader};

use crate::MultipartConfig;

/// Shared state of the upload routes
#[derive(Clone)]
pub struct UploadState {
    pub uploader: Arc<Uploader>,
    pub disks: Arc<DiskRegistry>,
    pub multipart: Arc<MultipartConfig>,
    /// Form field the file (or chunk) is sent under
    pub field: Arc<str>,
}

impl UploadState {
    pub fn new(uploader: Uploader, disks: DiskRegistry) -> Self {
        Self {
            uploader: Arc::new(uploader),
            disks: Arc::new(disks),
            multipart: Arc::new(MultipartConfig::default()),
            field: Arc::from("file"),
        }
    }

    pub fn with_multipart(mut self, config: MultipartConfig) -> Self {
        self.multipart = Arc::new(config);
        self
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Arc::from(field);
        self
    }
}
