use crate::{ChunkSave, ChunkStore, HandlerKind, UploadError, UploadRequest, UploadResult};

/// Receives the file field of one request, routing chunks through a [`ChunkStore`]
pub struct FileReceiver<'a> {
    index: &'a str,
    kind: HandlerKind,
    chunks: &'a dyn ChunkStore,
    max_chunks: u32,
}

impl<'a> FileReceiver<'a> {
    pub fn new(index: &'a str, kind: HandlerKind, chunks: &'a dyn ChunkStore, max_chunks: u32) -> Self {
        Self {
            index,
            kind,
            chunks,
            max_chunks,
        }
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Whether the request carries a file under the receiver's field
    pub fn is_uploaded(&self, request: &UploadRequest) -> bool {
        request.has_file(self.index)
    }

    /// Take the file out of the request and store it.
    ///
    /// Single uploads finish immediately; chunks finish once their session is complete.
    pub async fn receive(&self, request: &mut UploadRequest) -> UploadResult<ChunkSave> {
        let Some(file) = request.file(self.index) else {
            return Err(UploadError::missing_file(self.index));
        };

        let Some(part) = self.kind.describe(request, Some(file), self.max_chunks)? else {
            let file = request
                .take_file(self.index)
                .ok_or_else(|| UploadError::missing_file(self.index))?;
            return Ok(ChunkSave::Finished(file));
        };

        let file = request
            .take_file(self.index)
            .ok_or_else(|| UploadError::missing_file(self.index))?;
        self.chunks.save_chunk(part, file).await
    }

    /// Whether the chunk a probe request describes is already stored.
    /// Single uploads and unscoped callers have nothing to probe.
    pub async fn has_chunk(&self, request: &UploadRequest) -> UploadResult<bool> {
        if request.session().is_none() {
            return Ok(false);
        }
        match self.kind.describe(request, request.file(self.index), self.max_chunks)? {
            Some(part) => self.chunks.has_chunk(&part).await,
            None => Ok(false),
        }
    }
}
