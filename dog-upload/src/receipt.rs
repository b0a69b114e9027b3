use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ChunkProgress;

/// Receipt returned after a file was stored
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Path the blob store resolved the file to
    pub path: String,
    pub disk: String,
    pub size_bytes: u64,
    /// User-facing success message
    pub message: String,
    pub elapsed: Duration,
}

/// JSON body answered to an upload request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    /// More chunks are expected
    Progress { done: f64, status: bool },
    /// The file is stored
    Complete { message: String },
}

impl UploadResponse {
    pub fn progress(progress: &ChunkProgress) -> Self {
        Self::Progress {
            done: progress.percentage_done(),
            status: true,
        }
    }

    pub fn complete(receipt: &UploadReceipt) -> Self {
        Self::Complete {
            message: receipt.message.clone(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}
