mod settings;

use std::sync::Arc;
use std::time::Duration;

use dog_upload::{
    DiskRegistry, LocalBlobStore, UploadConfig, UploadEvent, UploadEventKind, Uploader,
};
use dog_upload_axum::{UploadApp, UploadState};
use tokio::task::JoinHandle;

pub use settings::ServerSettings;

/// Build the file manager: one local disk, uploads under `/uploads`, and `/health`
pub fn build(settings: &ServerSettings, config: UploadConfig) -> UploadApp {
    let disks = DiskRegistry::new(
        settings.disk.clone(),
        Arc::new(LocalBlobStore::new(settings.upload_root.clone())),
    );

    let uploader = Uploader::new(config).with_events(|event: UploadEvent| match event.kind {
        UploadEventKind::Uploading => {
            tracing::debug!(disk = %event.disk, path = %event.path, "upload starting")
        }
        UploadEventKind::Uploaded => {
            tracing::info!(disk = %event.disk, path = %event.path, "upload stored")
        }
    });

    UploadApp::new(UploadState::new(uploader, disks))
        .use_uploads("/uploads")
        .service("/health", || async { "ok" })
}

/// Periodically remove chunk sessions that were abandoned mid-upload
pub fn spawn_chunk_sweeper(uploader: Arc<Uploader>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = uploader.clear_expired_chunks().await {
                tracing::warn!(error = %e, "chunk sweep failed");
            }
        }
    })
}
