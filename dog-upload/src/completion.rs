use std::sync::Arc;
use std::time::Instant;

use tokio_util::io::ReaderStream;

use crate::config::{UploadMessages, MSG_UPLOADED};
use crate::path::{destination_path, folder_of};
use crate::{
    EventPublisher, OverwritePolicy, PersistStrategy, UploadConfig, UploadError, UploadEvent,
    UploadReceipt, UploadRequest, UploadResult, UploadValidator, UploadedFile,
};

/// Persists a whole file to the request's blob store and announces it.
///
/// The temporary file is removed before `complete` returns, whether or not
/// the write succeeded.
pub struct UploadCompletionHandler {
    validator: Arc<dyn UploadValidator>,
    events: Arc<dyn EventPublisher>,
    strategy: PersistStrategy,
    overwrite: OverwritePolicy,
    stream_buffer_bytes: usize,
    messages: UploadMessages,
}

impl UploadCompletionHandler {
    pub fn new(
        validator: Arc<dyn UploadValidator>,
        events: Arc<dyn EventPublisher>,
        config: &UploadConfig,
    ) -> Self {
        Self {
            validator,
            events,
            strategy: config.strategy,
            overwrite: config.overwrite,
            stream_buffer_bytes: config.stream_buffer_bytes,
            messages: config.messages.clone(),
        }
    }

    pub fn strategy(&self) -> PersistStrategy {
        self.strategy
    }

    pub async fn complete(
        &self,
        file: UploadedFile,
        request: &UploadRequest,
    ) -> UploadResult<UploadReceipt> {
        let started = Instant::now();
        let size_bytes = file.size();
        let result = self.persist(&file, request).await;

        if let Err(e) = file.discard() {
            tracing::warn!(error = %e, "failed to remove temporary upload file");
        }

        let path = result?;
        let manager = request.manager();
        self.events
            .publish(UploadEvent::uploaded(manager.filesystem(), manager.disk(), &path));

        let elapsed = started.elapsed();
        tracing::info!(
            disk = manager.disk(),
            path = %path,
            bytes = size_bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            "upload stored"
        );

        Ok(UploadReceipt {
            path,
            disk: manager.disk().to_string(),
            size_bytes,
            message: self.messages.get(MSG_UPLOADED),
            elapsed,
        })
    }

    /// Validate, announce and write the file; returns the stored path
    async fn persist(&self, file: &UploadedFile, request: &UploadRequest) -> UploadResult<String> {
        self.validator.validate_upload(request, Some(file), true)?;

        let path = destination_path(request.file_path(), file.client_original_name())?;
        let manager = request.manager();
        let store = manager.filesystem();

        if self.overwrite == OverwritePolicy::Reject && store.exists(&path).await? {
            return Err(UploadError::already_exists(path));
        }

        self.events
            .publish(UploadEvent::uploading(manager.filesystem(), manager.disk(), &path));

        match self.strategy {
            PersistStrategy::StreamCopy => {
                let source = tokio::fs::File::open(file.real_path()).await?;
                let stream = ReaderStream::with_capacity(source, self.stream_buffer_bytes);
                let put = store.write_stream(&path, Box::pin(stream)).await?;
                Ok(put.path)
            }
            PersistStrategy::MoveAs => {
                let name = path.rsplit('/').next().unwrap_or(path.as_str());
                store
                    .put_file_as(folder_of(&path), file.real_path(), name)
                    .await
            }
        }
    }
}
