use std::sync::Arc;

use crate::config::ERR_UPLOAD_VALIDATION;
use crate::{
    ChunkSave, ChunkStore, DiskChunkStore, EventPublisher, FileReceiver, HandlerKind,
    NoopPublisher, RulesValidator, UploadCompletionHandler, UploadConfig, UploadError,
    UploadRequest, UploadResponse, UploadResult, UploadValidator,
};

/// Handles upload requests end to end: validation, chunk reception and,
/// once a file is whole, persistence through [`UploadCompletionHandler`].
///
/// `Uploader` holds no per-request state and is shared behind an `Arc`.
pub struct Uploader {
    chunks: Arc<dyn ChunkStore>,
    validator: Arc<dyn UploadValidator>,
    events: Arc<dyn EventPublisher>,
    completion: UploadCompletionHandler,
    config: UploadConfig,
}

impl Uploader {
    /// Create an uploader with a disk chunk store under `config.chunk_dir`,
    /// rule-based validation and no event publishing
    pub fn new(config: UploadConfig) -> Self {
        let chunks: Arc<dyn ChunkStore> = Arc::new(DiskChunkStore::new(config.chunk_dir.clone()));
        let validator: Arc<dyn UploadValidator> = Arc::new(RulesValidator::new(config.rules.clone()));
        let events: Arc<dyn EventPublisher> = Arc::new(NoopPublisher);
        let completion =
            UploadCompletionHandler::new(Arc::clone(&validator), Arc::clone(&events), &config);
        Self {
            chunks,
            validator,
            events,
            completion,
            config,
        }
    }

    pub fn with_events<E: EventPublisher + 'static>(mut self, events: E) -> Self {
        self.events = Arc::new(events);
        self.rebuild_completion();
        self
    }

    pub fn with_validator<V: UploadValidator + 'static>(mut self, validator: V) -> Self {
        self.validator = Arc::new(validator);
        self.rebuild_completion();
        self
    }

    pub fn with_chunk_store<C: ChunkStore + 'static>(mut self, chunks: C) -> Self {
        self.chunks = Arc::new(chunks);
        self
    }

    fn rebuild_completion(&mut self) {
        self.completion = UploadCompletionHandler::new(
            Arc::clone(&self.validator),
            Arc::clone(&self.events),
            &self.config,
        );
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Handle one upload request whose file sits in field `index`.
    ///
    /// Returns a progress response while chunks are outstanding and a
    /// completion response once the file is stored. A request refused before
    /// any chunk is received fails under `errors.file.upload_validation`;
    /// validation messages come from `config.messages`.
    pub async fn handle(
        &self,
        request: UploadRequest,
        index: &str,
    ) -> UploadResult<UploadResponse> {
        self.handle_request(request, index)
            .await
            .map_err(|e| self.config.messages.localize(e))
    }

    async fn handle_request(
        &self,
        mut request: UploadRequest,
        index: &str,
    ) -> UploadResult<UploadResponse> {
        if let Err(e) = self.validator.validate_upload(&request, None, false) {
            tracing::debug!(error = %e, "upload request failed validation");
            return Err(match e {
                UploadError::Validation { message, .. } => {
                    UploadError::validation(ERR_UPLOAD_VALIDATION, message)
                }
                other => other,
            });
        }

        let kind = HandlerKind::from_request(&request);
        let receiver = FileReceiver::new(index, kind, self.chunks.as_ref(), self.config.rules.max_chunks);
        if !receiver.is_uploaded(&request) {
            return Err(UploadError::missing_file(index));
        }

        match receiver.receive(&mut request).await? {
            ChunkSave::InProgress(progress) => Ok(UploadResponse::progress(&progress)),
            ChunkSave::Finished(file) => {
                tracing::debug!(
                    handler = kind.name(),
                    name = file.client_original_name(),
                    size = file.size(),
                    "upload received"
                );
                let receipt = self.completion.complete(file, &request).await?;
                Ok(UploadResponse::complete(&receipt))
            }
        }
    }

    /// Answer a resumable.js test-chunk probe: is the described chunk already stored?
    pub async fn probe(&self, request: &UploadRequest, index: &str) -> UploadResult<bool> {
        let kind = HandlerKind::from_request(request);
        FileReceiver::new(index, kind, self.chunks.as_ref(), self.config.rules.max_chunks)
            .has_chunk(request)
            .await
    }

    /// Sweep chunk sessions older than the configured expiry
    pub async fn clear_expired_chunks(&self) -> UploadResult<usize> {
        let removed = self.chunks.clear_expired(self.config.chunk_expiry).await?;
        if removed > 0 {
            tracing::info!(removed, "cleared expired chunk sessions");
        }
        Ok(removed)
    }
}
