//! Client-facing error kinds.

use thiserror::Error;

use recast_manager::ManagerError;
use recast_media::MediaError;
use recast_models::FormatError;
use recast_storage::StorageError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced to clients. An RPC layer maps these onto its status
/// codes.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<FormatError> for ServiceError {
    fn from(e: FormatError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<MediaError> for ServiceError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Cancelled => Self::Cancelled("operation cancelled".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ManagerError> for ServiceError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::VideoNotFound(id) => Self::NotFound(format!("Video not found: {id}")),
            ManagerError::JobNotFound(id) => Self::NotFound(format!("Job not found: {id}")),
            ManagerError::Media(media) => media.into(),
            ManagerError::Storage(storage) => storage.into(),
            ManagerError::Shutdown => Self::Internal("manager is shut down".to_string()),
        }
    }
}
