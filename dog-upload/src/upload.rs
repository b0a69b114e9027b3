use std::time::Duration;

use async_trait::async_trait;

use crate::config::{UploadRules, ERR_EXTENSION, ERR_FILE_TOO_LARGE};
use crate::{ChunkPart, ChunkSave, UploadError, UploadRequest, UploadResult, UploadedFile};

/// Scratch storage for chunk sessions
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Store one chunk and report whether its session is now complete.
    /// A complete session yields the assembled file.
    async fn save_chunk(&self, part: ChunkPart, file: UploadedFile) -> UploadResult<ChunkSave>;

    /// Whether the chunk described by `part` is already stored
    async fn has_chunk(&self, part: &ChunkPart) -> UploadResult<bool>;

    /// Remove sessions and leftovers older than `max_age`; returns how many were removed
    async fn clear_expired(&self, max_age: Duration) -> UploadResult<usize>;
}

/// Upload constraints, checked on every request and again on the whole file
pub trait UploadValidator: Send + Sync {
    /// Validate `file`, or every file in the request when `file` is `None`.
    /// `final_pass` is set once the file is whole.
    fn validate_upload(
        &self,
        request: &UploadRequest,
        file: Option<&UploadedFile>,
        final_pass: bool,
    ) -> UploadResult<()>;
}

/// Validator driven by [`UploadRules`]
#[derive(Debug, Clone)]
pub struct RulesValidator {
    rules: UploadRules,
}

impl RulesValidator {
    pub fn new(rules: UploadRules) -> Self {
        Self { rules }
    }

    fn check(&self, file: &UploadedFile, final_pass: bool) -> UploadResult<()> {
        // a chunk never exceeds the whole file, so the size limit applies to both passes
        if let Some(max) = self.rules.max_file_bytes {
            if file.size() > max {
                return Err(UploadError::validation(
                    ERR_FILE_TOO_LARGE,
                    format!(
                        "{} is {} bytes, maximum is {}",
                        file.client_original_name(),
                        file.size(),
                        max
                    ),
                ));
            }
        }

        // chunks from some libraries arrive named "blob"; only the whole file has a reliable name
        if final_pass && !self.rules.allowed_extensions.is_empty() {
            let allowed = file
                .client_extension()
                .map(|ext| self.rules.allowed_extensions.contains(&ext))
                .unwrap_or(false);
            if !allowed {
                return Err(UploadError::validation(
                    ERR_EXTENSION,
                    format!("{} has a disallowed extension", file.client_original_name()),
                ));
            }
        }
        Ok(())
    }
}

impl UploadValidator for RulesValidator {
    fn validate_upload(
        &self,
        request: &UploadRequest,
        file: Option<&UploadedFile>,
        final_pass: bool,
    ) -> UploadResult<()> {
        match file {
            Some(file) => self.check(file, final_pass),
            None => request
                .files()
                .try_for_each(|(_, file)| self.check(file, final_pass)),
        }
    }
}
