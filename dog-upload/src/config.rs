use std::collections::{BTreeSet, HashMap};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::{UploadError, UploadResult};

pub const MSG_UPLOADED: &str = "messages.file.upload";
pub const ERR_UPLOAD_VALIDATION: &str = "errors.file.upload_validation";
pub const ERR_FILE_TOO_LARGE: &str = "errors.file.too_large";
pub const ERR_EXTENSION: &str = "errors.file.extension";
pub const ERR_INVALID_PATH: &str = "errors.file.invalid_path";

/// Configuration for upload handling
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Constraints checked on the first request and again on the assembled file
    pub rules: UploadRules,

    /// Scratch directory for chunk sessions and assembled files
    pub chunk_dir: PathBuf,

    /// Read buffer used when streaming a finished file into the blob store
    pub stream_buffer_bytes: usize,

    pub strategy: PersistStrategy,

    pub overwrite: OverwritePolicy,

    /// Chunk sessions untouched for longer than this are swept by `clear_expired`
    pub chunk_expiry: Duration,

    pub messages: UploadMessages,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            rules: UploadRules::default(),
            chunk_dir: env::temp_dir().join("dog-upload-chunks"),
            stream_buffer_bytes: 1024 * 1024, // 1MB
            strategy: PersistStrategy::StreamCopy,
            overwrite: OverwritePolicy::Replace,
            chunk_expiry: Duration::from_secs(3 * 60 * 60),
            messages: UploadMessages::default(),
        }
    }
}

/// Constraints applied to incoming files
#[derive(Debug, Clone)]
pub struct UploadRules {
    /// Max size of a whole file (None = unlimited)
    pub max_file_bytes: Option<u64>,

    /// Lower-cased extensions without the dot (empty = all allowed)
    pub allowed_extensions: BTreeSet<String>,

    /// Upper bound on the chunk count a client may announce
    pub max_chunks: u32,
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            max_file_bytes: Some(5 * 1024 * 1024 * 1024), // 5GB
            allowed_extensions: BTreeSet::new(),
            max_chunks: 10_000,
        }
    }
}

/// How a finished file is handed to the blob store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStrategy {
    /// Open the temp file and stream it through `BlobStore::write_stream`
    StreamCopy,
    /// Hand the temp file to `BlobStore::put_file_as`
    MoveAs,
}

/// What to do when the destination path is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    Replace,
    Reject,
}

/// User-facing texts keyed by message key. Unknown keys render as the key itself.
#[derive(Debug, Clone)]
pub struct UploadMessages {
    texts: HashMap<String, String>,
}

impl Default for UploadMessages {
    fn default() -> Self {
        let mut texts = HashMap::new();
        texts.insert(MSG_UPLOADED.to_string(), "File uploaded successfully.".to_string());
        texts.insert(
            ERR_UPLOAD_VALIDATION.to_string(),
            "The file could not be uploaded.".to_string(),
        );
        texts.insert(ERR_FILE_TOO_LARGE.to_string(), "The file is too large.".to_string());
        texts.insert(ERR_EXTENSION.to_string(), "This file type is not allowed.".to_string());
        texts.insert(ERR_INVALID_PATH.to_string(), "The destination path is invalid.".to_string());
        Self { texts }
    }
}

impl UploadMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override or add a message
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, text: V) -> Self {
        self.texts.insert(key.into(), text.into());
        self
    }

    pub fn get(&self, key: &str) -> String {
        self.texts
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Replace a validation error's message with the text configured for its key.
    /// Other errors, and keys without a text, pass through unchanged.
    pub fn localize(&self, err: UploadError) -> UploadError {
        match err {
            UploadError::Validation { key, message } => {
                let message = self.texts.get(&key).cloned().unwrap_or(message);
                UploadError::Validation { key, message }
            }
            other => other,
        }
    }
}

impl UploadConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `DOG_UPLOAD_*` environment variables, defaulting what is unset
    pub fn from_env() -> UploadResult<Self> {
        let mut config = Self::default();

        if let Some(dir) = read_env("DOG_UPLOAD_CHUNK_DIR") {
            config.chunk_dir = PathBuf::from(dir);
        }
        if let Some(max) = read_env("DOG_UPLOAD_MAX_FILE_BYTES") {
            config.rules.max_file_bytes = Some(parse_env("DOG_UPLOAD_MAX_FILE_BYTES", &max)?);
        }
        if let Some(exts) = read_env("DOG_UPLOAD_ALLOWED_EXTENSIONS") {
            for ext in exts.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                config.rules = config.rules.allow_extension(ext);
            }
        }
        if let Some(max) = read_env("DOG_UPLOAD_MAX_CHUNKS") {
            config.rules.max_chunks = parse_env("DOG_UPLOAD_MAX_CHUNKS", &max)?;
        }
        if let Some(strategy) = read_env("DOG_UPLOAD_STRATEGY") {
            config.strategy = match strategy.to_ascii_lowercase().as_str() {
                "stream" => PersistStrategy::StreamCopy,
                "move" => PersistStrategy::MoveAs,
                other => {
                    return Err(UploadError::config(format!(
                        "DOG_UPLOAD_STRATEGY must be 'stream' or 'move', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(policy) = read_env("DOG_UPLOAD_OVERWRITE") {
            config.overwrite = match policy.to_ascii_lowercase().as_str() {
                "replace" => OverwritePolicy::Replace,
                "reject" => OverwritePolicy::Reject,
                other => {
                    return Err(UploadError::config(format!(
                        "DOG_UPLOAD_OVERWRITE must be 'replace' or 'reject', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(secs) = read_env("DOG_UPLOAD_CHUNK_EXPIRY_SECS") {
            config.chunk_expiry =
                Duration::from_secs(parse_env("DOG_UPLOAD_CHUNK_EXPIRY_SECS", &secs)?);
        }

        Ok(config)
    }

    pub fn with_rules(mut self, rules: UploadRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_chunk_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.chunk_dir = dir.into();
        self
    }

    pub fn with_stream_buffer(mut self, bytes: usize) -> Self {
        self.stream_buffer_bytes = bytes.max(1);
        self
    }

    pub fn with_strategy(mut self, strategy: PersistStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    pub fn with_chunk_expiry(mut self, expiry: Duration) -> Self {
        self.chunk_expiry = expiry;
        self
    }

    pub fn with_messages(mut self, messages: UploadMessages) -> Self {
        self.messages = messages;
        self
    }
}

impl UploadRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = Some(bytes);
        self
    }

    pub fn unlimited_size(mut self) -> Self {
        self.max_file_bytes = None;
        self
    }

    /// Allow an extension; leading dots and case are ignored
    pub fn allow_extension(mut self, ext: &str) -> Self {
        self.allowed_extensions
            .insert(ext.trim_start_matches('.').to_ascii_lowercase());
        self
    }

    pub fn with_max_chunks(mut self, max: u32) -> Self {
        self.max_chunks = max;
        self
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> UploadResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| UploadError::config(format!("{} has an invalid value '{}'", key, value)))
}
