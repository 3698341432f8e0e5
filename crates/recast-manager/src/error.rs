//! Error types for job creation and scheduling.

use thiserror::Error;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors surfaced when creating or submitting jobs.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Manager is shut down")]
    Shutdown,

    #[error("Storage error: {0}")]
    Storage(#[from] recast_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] recast_media::MediaError),
}
