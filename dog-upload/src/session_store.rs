use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use crate::{
    ChunkPart, ChunkPosition, ChunkProgress, ChunkSave, ChunkSessionId, ChunkStore, UploadError,
    UploadResult, UploadedFile,
};

const META_FILE: &str = "meta.json";
const PART_SUFFIX: &str = ".part";
const ASSEMBLED_SUFFIX: &str = ".assembled";
const ASSEMBLY_BUFFER: usize = 1024 * 1024;

/// Chunk store keeping each session in its own scratch directory:
///
/// ```text
/// <root>/<session>/meta.json
/// <root>/<session>/00000000000000000001.part
/// <root>/<session>.<uuid>.assembled
/// ```
///
/// Requests for one session are serialized by a per-session lock.
pub struct DiskChunkStore {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// What the first chunk of a session announced
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionMeta {
    original_name: String,
    content_type: Option<String>,
    total: u64,
    ranged: bool,
    created_at: i64,
}

/// A stored part: its key and size in bytes
#[derive(Debug, Clone, Copy)]
struct StoredPart {
    key: u64,
    size: u64,
}

/// A slice of a part that goes into the assembled file
#[derive(Debug, Clone, Copy)]
struct Segment {
    key: u64,
    skip: u64,
}

impl DiskChunkStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session: &ChunkSessionId) -> PathBuf {
        self.root.join(session.as_str())
    }

    fn part_path(dir: &Path, key: u64) -> PathBuf {
        dir.join(format!("{:020}{}", key, PART_SUFFIX))
    }

    fn lock_for(&self, session: &ChunkSessionId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(session.as_str().to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Forget a session's lock unless another request still holds a handle to it.
    /// Call with the guard held; the map and `lock` account for two references.
    fn release_lock(&self, session: &ChunkSessionId, lock: &Arc<Mutex<()>>) {
        self.locks
            .remove_if(session.as_str(), |_, held| Arc::ptr_eq(held, lock) && Arc::strong_count(held) == 2);
    }

    async fn load_or_init_meta(&self, dir: &Path, part: &ChunkPart) -> UploadResult<SessionMeta> {
        let meta_path = dir.join(META_FILE);
        match tokio::fs::read(&meta_path).await {
            Ok(raw) => {
                let meta: SessionMeta = serde_json::from_slice(&raw)?;
                if meta.total != part.position.total() || meta.ranged != part.position.is_range() {
                    return Err(UploadError::invalid_chunk(format!(
                        "session {} was started with a total of {}, got {}",
                        part.session,
                        meta.total,
                        part.position.total()
                    )));
                }
                Ok(meta)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let meta = SessionMeta {
                    original_name: part.original_name.clone(),
                    content_type: part.content_type.clone(),
                    total: part.position.total(),
                    ranged: part.position.is_range(),
                    created_at: chrono::Utc::now().timestamp(),
                };
                tokio::fs::write(&meta_path, serde_json::to_vec(&meta)?).await?;
                Ok(meta)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move a request's chunk into the session directory, replacing an earlier copy
    async fn move_into(file: UploadedFile, dest: &Path) -> UploadResult<()> {
        let source = file.real_path().to_path_buf();
        if tokio::fs::rename(&source, dest).await.is_err() {
            tokio::fs::copy(&source, dest).await?;
        }
        file.discard()?;
        Ok(())
    }

    async fn list_parts(dir: &Path) -> UploadResult<Vec<StoredPart>> {
        let mut parts = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(key) = name
                .to_str()
                .and_then(|n| n.strip_suffix(PART_SUFFIX))
                .and_then(|n| n.parse::<u64>().ok())
            else {
                continue;
            };
            let size = entry.metadata().await?.len();
            parts.push(StoredPart { key, size });
        }
        parts.sort_by_key(|p| p.key);
        Ok(parts)
    }

    /// Progress of a session, plus the assembly plan once it is complete
    fn coverage(position: &ChunkPosition, parts: &[StoredPart]) -> (ChunkProgress, Option<Vec<Segment>>) {
        match position {
            ChunkPosition::Indexed { total, .. } => {
                let total = u64::from(*total);
                let present: Vec<Segment> = parts
                    .iter()
                    .filter(|p| p.key >= 1 && p.key <= total)
                    .map(|p| Segment { key: p.key, skip: 0 })
                    .collect();
                let progress = ChunkProgress::new(present.len() as u64, total);
                let plan = progress.is_complete().then_some(present);
                (progress, plan)
            }
            ChunkPosition::Range { total, .. } => {
                let mut covered = 0u64;
                let mut segments = Vec::new();
                for part in parts {
                    if part.key > covered {
                        break;
                    }
                    let end = part.key + part.size;
                    if end > covered {
                        segments.push(Segment {
                            key: part.key,
                            skip: covered - part.key,
                        });
                        covered = end;
                    }
                }
                let progress = ChunkProgress::new(covered.min(*total), *total);
                let plan = progress.is_complete().then_some(segments);
                (progress, plan)
            }
        }
    }

    async fn assemble(
        &self,
        session: &ChunkSessionId,
        dir: &Path,
        segments: &[Segment],
    ) -> UploadResult<(PathBuf, u64)> {
        let target = self.root.join(format!(
            "{}.{}{}",
            session,
            uuid::Uuid::new_v4().simple(),
            ASSEMBLED_SUFFIX
        ));

        let written = async {
            let out = tokio::fs::File::create(&target).await?;
            let mut writer = BufWriter::with_capacity(ASSEMBLY_BUFFER, out);
            let mut written = 0u64;
            for segment in segments {
                let mut part = tokio::fs::File::open(Self::part_path(dir, segment.key)).await?;
                if segment.skip > 0 {
                    part.seek(SeekFrom::Start(segment.skip)).await?;
                }
                written += tokio::io::copy(&mut part, &mut writer).await?;
            }
            writer.flush().await?;
            writer.get_ref().sync_all().await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        match written {
            Ok(size) => Ok((target, size)),
            Err(e) => {
                let _ = tokio::fs::remove_file(&target).await;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl ChunkStore for DiskChunkStore {
    async fn save_chunk(&self, part: ChunkPart, file: UploadedFile) -> UploadResult<ChunkSave> {
        let lock = self.lock_for(&part.session);
        let _guard = lock.lock().await;

        let dir = self.session_dir(&part.session);
        tokio::fs::create_dir_all(&dir).await?;

        let meta = self.load_or_init_meta(&dir, &part).await?;
        Self::move_into(file, &Self::part_path(&dir, part.position.part_key())).await?;

        let parts = Self::list_parts(&dir).await?;
        let (progress, plan) = Self::coverage(&part.position, &parts);

        let Some(segments) = plan else {
            tracing::debug!(
                session = %part.session,
                chunk = part.position.part_key(),
                received = progress.received,
                total = progress.total,
                "chunk stored"
            );
            return Ok(ChunkSave::InProgress(progress));
        };

        let (assembled, size) = self.assemble(&part.session, &dir, &segments).await?;
        if meta.ranged && size != meta.total {
            let _ = tokio::fs::remove_file(&assembled).await;
            return Err(UploadError::invalid_chunk(format!(
                "assembled {} bytes, expected {}",
                size, meta.total
            )));
        }

        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            tracing::warn!(session = %part.session, error = %e, "failed to remove chunk session");
        }
        self.release_lock(&part.session, &lock);

        tracing::debug!(session = %part.session, size, parts = segments.len(), "chunk session assembled");

        let mut file = UploadedFile::new(assembled, size, meta.original_name);
        if let Some(content_type) = meta.content_type {
            file = file.with_content_type(content_type);
        }
        Ok(ChunkSave::Finished(file))
    }

    async fn has_chunk(&self, part: &ChunkPart) -> UploadResult<bool> {
        let path = Self::part_path(&self.session_dir(&part.session), part.position.part_key());
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(match part.position {
                ChunkPosition::Range { start, end, .. } => meta.len() == end - start + 1,
                ChunkPosition::Indexed { .. } => true,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear_expired(&self, max_age: Duration) -> UploadResult<usize> {
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return Ok(0);
        };

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.modified()? > cutoff {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            if meta.is_dir() {
                let session = ChunkSessionId(name.clone());
                let lock = self.lock_for(&session);
                // a session some request is waiting on is not stale
                if Arc::strong_count(&lock) > 2 {
                    continue;
                }
                let Ok(_guard) = lock.try_lock() else {
                    continue;
                };
                tokio::fs::remove_dir_all(entry.path()).await?;
                self.release_lock(&session, &lock);
            } else if name.ends_with(ASSEMBLED_SUFFIX) {
                tokio::fs::remove_file(entry.path()).await?;
            } else {
                continue;
            }

            tracing::debug!(entry = %name, "removed expired chunk data");
            removed += 1;
        }
        Ok(removed)
    }
}
