//! Chunking conventions of client-side upload libraries.

use crate::{
    ChunkPart, ChunkPosition, ChunkSessionId, UploadError, UploadRequest, UploadResult,
    UploadedFile,
};

/// Upload library convention a request follows, detected from its params and headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// resumable.js: `resumableChunkNumber` (1-based) / `resumableTotalChunks`
    Resumable,
    /// Dropzone: `dzuuid`, `dzchunkindex` (0-based) / `dztotalchunkcount`
    Dropzone,
    /// `Content-Range: bytes start-end/total`
    ContentRange,
    /// plupload style: `chunk` (0-based) / `chunks`
    ChunksInRequest,
    /// The request carries the whole file
    Single,
}

impl HandlerKind {
    /// Pick the handler for a request; the first matching convention wins
    pub fn from_request(request: &UploadRequest) -> Self {
        if request.param("resumableChunkNumber").is_some() {
            HandlerKind::Resumable
        } else if request.param("dzuuid").is_some() {
            HandlerKind::Dropzone
        } else if request.header("content-range").is_some() {
            HandlerKind::ContentRange
        } else if request.param("chunk").is_some() && request.param("chunks").is_some() {
            HandlerKind::ChunksInRequest
        } else {
            HandlerKind::Single
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HandlerKind::Resumable => "resumable",
            HandlerKind::Dropzone => "dropzone",
            HandlerKind::ContentRange => "content-range",
            HandlerKind::ChunksInRequest => "chunks-in-request",
            HandlerKind::Single => "single",
        }
    }

    pub fn is_chunked(&self) -> bool {
        !matches!(self, HandlerKind::Single)
    }

    /// Describe the chunk carried by `request`. `None` for single uploads.
    ///
    /// `file` is the request's chunk when one is present; probe requests have none.
    /// Chunked requests must carry a caller session, which scopes the chunk session.
    pub fn describe(
        &self,
        request: &UploadRequest,
        file: Option<&UploadedFile>,
        max_chunks: u32,
    ) -> UploadResult<Option<ChunkPart>> {
        let file_name = file.map(|f| f.client_original_name()).unwrap_or_default();

        let (identifier, original_name, position) = match self {
            HandlerKind::Single => return Ok(None),
            HandlerKind::Resumable => {
                let number = parse_u32(request, "resumableChunkNumber")?;
                let total = parse_u32(request, "resumableTotalChunks")?;
                let original_name = request
                    .param("resumableFilename")
                    .unwrap_or(file_name)
                    .to_string();
                let identifier = match request.param("resumableIdentifier") {
                    Some(id) => id.to_string(),
                    None => format!(
                        "{}-{}",
                        original_name,
                        request.param("resumableTotalSize").unwrap_or_default()
                    ),
                };
                (identifier, original_name, indexed(number, total, max_chunks)?)
            }
            HandlerKind::Dropzone => {
                let index = parse_u32(request, "dzchunkindex")?;
                let total = parse_u32(request, "dztotalchunkcount")?;
                let identifier = request.param("dzuuid").unwrap_or_default().to_string();
                (
                    identifier,
                    file_name.to_string(),
                    indexed(index.saturating_add(1), total, max_chunks)?,
                )
            }
            HandlerKind::ChunksInRequest => {
                let index = parse_u32(request, "chunk")?;
                let total = parse_u32(request, "chunks")?;
                let original_name = request.param("name").unwrap_or(file_name).to_string();
                (
                    original_name.clone(),
                    original_name,
                    indexed(index.saturating_add(1), total, max_chunks)?,
                )
            }
            HandlerKind::ContentRange => {
                let header = request.header("content-range").unwrap_or_default();
                let position = parse_content_range(header)?;
                (
                    format!("{}-{}", file_name, position.total()),
                    file_name.to_string(),
                    position,
                )
            }
        };

        if let (Some(file), ChunkPosition::Range { start, end, .. }) = (file, &position) {
            let expected = end - start + 1;
            if file.size() != expected {
                return Err(UploadError::invalid_chunk(format!(
                    "chunk carries {} bytes but its range spans {}",
                    file.size(),
                    expected
                )));
            }
        }

        // client identifiers are only unique per caller
        let scope = request
            .session()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| UploadError::invalid_chunk("chunked upload carries no session scope"))?;
        let session = ChunkSessionId::derive(&[self.name(), &identifier, scope]);

        Ok(Some(ChunkPart {
            session,
            position,
            original_name,
            content_type: file.and_then(|f| f.content_type()).map(str::to_string),
        }))
    }
}

fn parse_u32(request: &UploadRequest, key: &str) -> UploadResult<u32> {
    let raw = request
        .param(key)
        .ok_or_else(|| UploadError::invalid_chunk(format!("missing parameter '{}'", key)))?;
    raw.trim()
        .parse()
        .map_err(|_| UploadError::invalid_chunk(format!("parameter '{}' is not a number: '{}'", key, raw)))
}

fn indexed(number: u32, total: u32, max_chunks: u32) -> UploadResult<ChunkPosition> {
    if total == 0 || total > max_chunks {
        return Err(UploadError::invalid_chunk(format!(
            "total chunks {} outside 1-{}",
            total, max_chunks
        )));
    }
    if number == 0 || number > total {
        return Err(UploadError::invalid_chunk(format!(
            "chunk {} outside 1-{}",
            number, total
        )));
    }
    Ok(ChunkPosition::Indexed { number, total })
}

/// Parse `bytes <start>-<end>/<total>`
pub fn parse_content_range(header: &str) -> UploadResult<ChunkPosition> {
    let invalid = || UploadError::invalid_chunk(format!("malformed Content-Range '{}'", header));

    let value = header.trim().strip_prefix("bytes").ok_or_else(invalid)?.trim_start();
    let (range, total) = value.split_once('/').ok_or_else(invalid)?;
    let (start, end) = range.split_once('-').ok_or_else(invalid)?;

    let start: u64 = start.trim().parse().map_err(|_| invalid())?;
    let end: u64 = end.trim().parse().map_err(|_| invalid())?;
    let total: u64 = total.trim().parse().map_err(|_| invalid())?;

    if start > end || end >= total {
        return Err(UploadError::invalid_chunk(format!(
            "range {}-{} outside a {} byte file",
            start, end, total
        )));
    }
    Ok(ChunkPosition::Range { start, end, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_range() {
        assert_eq!(
            parse_content_range("bytes 0-99/200").unwrap(),
            ChunkPosition::Range { start: 0, end: 99, total: 200 }
        );
        assert!(parse_content_range("bytes 100-99/200").is_err());
        assert!(parse_content_range("bytes 0-200/200").is_err());
        assert!(parse_content_range("items 0-1/2").is_err());
        assert!(parse_content_range("bytes */200").is_err());
    }

    #[test]
    fn chunk_sessions_require_a_caller_scope() {
        let store: std::sync::Arc<dyn crate::BlobStore> = std::sync::Arc::new(crate::MemoryBlobStore::new());
        let manager = crate::DiskRegistry::new("public", store).manager(None).unwrap();
        let request = |session: Option<&str>| {
            let request = UploadRequest::new(manager.clone())
                .with_param("dzuuid", "u-1")
                .with_param("dzchunkindex", "0")
                .with_param("dztotalchunkcount", "2");
            match session {
                Some(s) => request.with_session(s),
                None => request,
            }
        };

        let err = HandlerKind::Dropzone.describe(&request(None), None, 10).unwrap_err();
        assert!(matches!(err, UploadError::InvalidChunk { .. }));
        assert!(HandlerKind::Dropzone.describe(&request(Some(" ")), None, 10).is_err());

        let a = HandlerKind::Dropzone.describe(&request(Some("a")), None, 10).unwrap().unwrap();
        let b = HandlerKind::Dropzone.describe(&request(Some("b")), None, 10).unwrap().unwrap();
        assert_ne!(a.session, b.session);
        assert!(HandlerKind::Single.describe(&request(None), None, 10).unwrap().is_none());
    }

    #[test]
    fn indexed_bounds() {
        assert!(indexed(1, 2, 10).is_ok());
        assert!(indexed(0, 2, 10).is_err());
        assert!(indexed(3, 2, 10).is_err());
        assert!(indexed(1, 0, 10).is_err());
        assert!(indexed(1, 11, 10).is_err());
    }
}
