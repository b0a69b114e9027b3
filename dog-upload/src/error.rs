use thiserror::Error;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors that can occur while receiving, assembling or persisting an upload
#[derive(Error, Debug)]
pub enum UploadError {
    /// The upload violates size, type or shape constraints.
    /// `key` is the message key a caller can localize.
    #[error("Upload validation failed: {message}")]
    Validation { key: String, message: String },

    #[error("No file was uploaded under field '{field}'")]
    MissingFile { field: String },

    #[error("Invalid chunk: {reason}")]
    InvalidChunk { reason: String },

    #[error("File already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl UploadError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create a validation error carrying a message key
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::Validation {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn missing_file<S: Into<String>>(field: S) -> Self {
        Self::MissingFile {
            field: field.into(),
        }
    }

    pub fn invalid_chunk<S: Into<String>>(reason: S) -> Self {
        Self::InvalidChunk {
            reason: reason.into(),
        }
    }

    pub fn already_exists<S: Into<String>>(path: S) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for failures of the storage backend or the filesystem underneath it
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Io { .. })
    }

    /// True for errors caused by the client's request rather than the server
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::MissingFile { .. }
                | Self::InvalidChunk { .. }
                | Self::AlreadyExists { .. }
        )
    }
}
