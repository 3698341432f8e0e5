//! Shared data models for the recast transcoding service.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and their lifecycle
//! - Target video formats and transcode options
//! - Probed video metadata and produced output files
//! - Upload chunks and the service request/response schemas

pub mod format;
pub mod ids;
pub mod job;
pub mod metadata;
pub mod options;
pub mod output;
pub mod response;
pub mod upload;

// Re-export common types
pub use format::{parse_format_list, FormatError, VideoFormat};
pub use ids::{JobId, UploadId, VideoId};
pub use job::{JobStatus, TranscodeJob};
pub use metadata::VideoMetadata;
pub use options::TranscodeOptions;
pub use output::OutputFile;
pub use response::{
    CancelResponse, JobStatusResponse, ListJobsResponse, TranscodeResponse, UploadResponse,
    UploadStatusResponse,
};
pub use upload::{UploadState, VideoChunk};
