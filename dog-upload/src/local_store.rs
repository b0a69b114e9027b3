use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::path::join_destination;
use crate::{BlobStore, ByteStream, PutResult, UploadError, UploadResult};

/// Blob store rooted at a local directory.
///
/// Writes go to a `.partial` sibling first and are renamed into place after `sync_all`,
/// so a reader never observes a half-written file.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a store path onto the filesystem, refusing anything outside the root
    fn resolve(&self, path: &str) -> UploadResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(UploadError::validation(
                        crate::config::ERR_INVALID_PATH,
                        format!("Path '{}' escapes the disk root", path),
                    ))
                }
            }
        }
        if resolved == self.root {
            return Err(UploadError::validation(
                crate::config::ERR_INVALID_PATH,
                "Empty destination path",
            ));
        }
        Ok(resolved)
    }

    async fn ensure_parent(target: &Path) -> UploadResult<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn partial_path(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.partial", uuid::Uuid::new_v4().simple()));
        target.with_file_name(name)
    }

    async fn write_partial(partial: &Path, mut stream: ByteStream) -> UploadResult<u64> {
        let mut file = tokio::fs::File::create(partial).await?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn write_stream(&self, path: &str, stream: ByteStream) -> UploadResult<PutResult> {
        let target = self.resolve(path)?;
        Self::ensure_parent(&target).await?;

        let partial = Self::partial_path(&target);
        let size_bytes = match Self::write_partial(&partial, stream).await {
            Ok(size) => size,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::debug!(path, size_bytes, "local store wrote file");
        Ok(PutResult {
            path: path.trim_start_matches('/').to_string(),
            size_bytes,
        })
    }

    async fn put_file_as(&self, folder: &str, source: &Path, name: &str) -> UploadResult<String> {
        let path = join_destination(folder, name);
        let target = self.resolve(&path)?;
        Self::ensure_parent(&target).await?;

        // Rename only works within one filesystem; otherwise copy through a partial file.
        if tokio::fs::rename(source, &target).await.is_ok() {
            tokio::fs::File::open(&target).await?.sync_all().await?;
            return Ok(path);
        }

        let partial = Self::partial_path(&target);
        let copied = async {
            tokio::fs::copy(source, &partial).await?;
            tokio::fs::File::open(&partial).await?.sync_all().await?;
            tokio::fs::rename(&partial, &target).await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = copied {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        tokio::fs::remove_file(source).await?;
        Ok(path)
    }

    async fn exists(&self, path: &str) -> UploadResult<bool> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&target).await?)
    }

    async fn delete(&self, path: &str) -> UploadResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
