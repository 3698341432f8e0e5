//! Upload chunk and session status types.

use serde::{Deserialize, Serialize};

/// One chunk of a client-streamed video upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoChunk {
    /// Upload session id; the first chunk may omit it to have the
    /// server generate one
    pub upload_id: Option<String>,
    /// Original filename
    pub filename: String,
    /// Declared content type
    pub content_type: String,
    /// Zero-based chunk sequence number
    pub sequence_number: u64,
    /// Marks the final chunk of the upload
    pub is_last_chunk: bool,
    /// Chunk payload
    pub content: Vec<u8>,
}

/// Observable state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// No such session
    Unknown,
    /// Chunks still arriving
    InProgress,
    /// Assembled; a video id has been assigned
    Completed,
    /// Chunk write or assembly failed
    Failed,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Unknown => "unknown",
            UploadState::InProgress => "in_progress",
            UploadState::Completed => "completed",
            UploadState::Failed => "failed",
        }
    }
}
