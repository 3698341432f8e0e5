//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the store or the session table.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload session not found: {0}")]
    SessionNotFound(String),

    #[error("Missing chunk {seq} during assembly")]
    MissingChunk { seq: u64 },

    #[error("Chunk {seq} arrived after the final chunk (total {total_chunks})")]
    ChunkAfterFinal { seq: u64, total_chunks: u64 },

    #[error("Chunk {seq} arrived after the upload was assembled")]
    ChunkAfterAssembly { seq: u64 },

    #[error("Upload incomplete: {0}")]
    IncompleteUpload(String),

    #[error("Assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
