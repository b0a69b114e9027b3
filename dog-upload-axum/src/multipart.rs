use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderMap};
use dog_upload::{DiskRegistry, UploadError, UploadRequest, UploadedFile, ERR_FILE_TOO_LARGE};
use tokio::io::AsyncWriteExt;

use crate::UploadHttpError;

/// Header carrying the caller's session token; scopes chunk sessions per client
pub const SESSION_HEADER: &str = "x-upload-session";

/// Cookie issued to callers that send no session header
pub const SESSION_COOKIE: &str = "dog_upload_session";

/// Form or query field naming the intended file path, file name included
pub const PATH_FIELD: &str = "path";

/// Form or query field selecting the disk; absent means the default disk
pub const DISK_FIELD: &str = "disk";

/// Limits and scratch location for multipart parsing
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Where file fields are spooled while the request is handled
    pub scratch_dir: PathBuf,
    /// Maximum bytes of one file field (None = unlimited)
    pub max_file_size: Option<u64>,
    /// Maximum bytes of the whole request body (None = unlimited)
    pub max_total_size: Option<u64>,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("dog-upload-incoming"),
            max_file_size: Some(100 * 1024 * 1024), // 100MB
            max_total_size: Some(500 * 1024 * 1024), // 500MB
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = Some(size);
        self
    }

    pub fn max_total_size(mut self, size: u64) -> Self {
        self.max_total_size = Some(size);
        self
    }
}

/// Stream a `multipart/form-data` body into an [`UploadRequest`].
///
/// File fields are written to `config.scratch_dir` chunk by chunk, never
/// buffered whole. Text fields and query parameters become request params
/// (form fields win). Every header is copied onto the request, which is
/// scoped to the caller `session`.
pub async fn read_upload_request(
    headers: &HeaderMap,
    query: HashMap<String, String>,
    body: Body,
    session: &str,
    config: &MultipartConfig,
    disks: &DiskRegistry,
) -> Result<UploadRequest, UploadHttpError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("multipart/form-data") {
        return Err(UploadHttpError::bad_request(format!(
            "Expected multipart/form-data, got '{}'",
            content_type
        )));
    }
    let boundary = multer::parse_boundary(content_type)?;

    let mut limits = multer::SizeLimit::new();
    if let Some(max) = config.max_total_size {
        limits = limits.whole_stream(max);
    }
    let mut multipart = multer::Multipart::with_constraints(
        body.into_data_stream(),
        boundary,
        multer::Constraints::new().size_limit(limits),
    );

    tokio::fs::create_dir_all(&config.scratch_dir).await?;

    let mut params = query;
    let mut files = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await?;
            params.insert(name, value);
            continue;
        };

        let content_type = field.content_type().map(|ct| ct.to_string());
        let path = config
            .scratch_dir
            .join(format!("upload-{}", uuid::Uuid::new_v4().simple()));

        let size = spool(&mut field, &path, config.max_file_size).await?;
        tracing::debug!(field = %name, file = %file_name, bytes = size, "file field spooled");

        let mut file = UploadedFile::new(path, size, file_name);
        if let Some(content_type) = content_type {
            file = file.with_content_type(content_type);
        }
        files.push((name, file));
    }

    let disk = params.get(DISK_FIELD).map(String::as_str).filter(|d| !d.is_empty());
    let manager = disks.manager(disk)?;

    let mut request = UploadRequest::new(manager)
        .with_file_path(params.get(PATH_FIELD).cloned().unwrap_or_default())
        .with_session(session);

    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    for (key, value) in params {
        request = request.with_param(key, value);
    }
    for (name, file) in files {
        request = request.with_file(name, file);
    }

    Ok(request)
}

/// Write one file field to `path`; the file is removed if anything fails
async fn spool(
    field: &mut multer::Field<'static>,
    path: &Path,
    max_size: Option<u64>,
) -> Result<u64, UploadHttpError> {
    let written = async {
        let mut out = tokio::fs::File::create(path).await?;
        let mut total = 0u64;
        while let Some(chunk) = field.chunk().await? {
            total += chunk.len() as u64;
            if let Some(max) = max_size {
                if total > max {
                    return Err(UploadError::validation(
                        ERR_FILE_TOO_LARGE,
                        format!("File exceeds maximum size of {} bytes", max),
                    )
                    .into());
                }
            }
            out.write_all(&chunk).await?;
        }
        out.flush().await?;
        Ok::<u64, UploadHttpError>(total)
    }
    .await;

    if written.is_err() {
        let _ = tokio::fs::remove_file(path).await;
    }
    written
}
