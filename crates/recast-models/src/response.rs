//! Service response schemas.
//!
//! These are the transport-agnostic shapes an RPC layer maps onto its
//! wire messages one-to-one.

use serde::{Deserialize, Serialize};

use crate::{JobId, JobStatus, OutputFile, TranscodeJob, UploadState};

/// Final response of a chunked upload stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Assigned video id, present iff the upload completed
    pub video_id: Option<String>,
    pub status: UploadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl UploadResponse {
    pub fn completed(video_id: impl Into<String>) -> Self {
        Self {
            video_id: Some(video_id.into()),
            status: UploadState::Completed,
            error_message: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            video_id: None,
            status: UploadState::Failed,
            error_message: Some(error.into()),
        }
    }
}

/// Response to an upload status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadStatusResponse {
    pub status: UploadState,
    /// Percent complete (0-100)
    pub percent_complete: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Response to a transcode request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub estimated_time_seconds: u32,
}

/// Response to a cancel request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Point-in-time view of a job, used by status queries, status streams
/// and job listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub video_id: String,
    pub status: JobStatus,
    /// Overall progress (0-100)
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    /// Epoch milliseconds, 0 when the job has not started
    pub start_time_ms: i64,
    /// Epoch milliseconds, 0 when the job has not finished
    pub end_time_ms: i64,
    pub estimated_time_remaining_secs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub output_files: Vec<OutputFile>,
}

impl JobStatusResponse {
    /// Response for a job id with no record.
    pub fn unknown(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            video_id: String::new(),
            status: JobStatus::Unknown,
            progress: 0,
            current_stage: None,
            start_time_ms: 0,
            end_time_ms: 0,
            estimated_time_remaining_secs: 0,
            error_message: Some("Job not found".to_string()),
            output_files: Vec::new(),
        }
    }
}

impl From<&TranscodeJob> for JobStatusResponse {
    fn from(job: &TranscodeJob) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            video_id: job.video_id.to_string(),
            status: job.status,
            progress: job.progress,
            current_stage: job.current_stage.clone(),
            start_time_ms: job.started_at.map(|t| t.timestamp_millis()).unwrap_or(0),
            end_time_ms: job.completed_at.map(|t| t.timestamp_millis()).unwrap_or(0),
            estimated_time_remaining_secs: job.estimated_time_remaining_secs,
            error_message: job.error_message.clone(),
            output_files: job.output_files.clone(),
        }
    }
}

/// One page of a job listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobStatusResponse>,
    /// Job id to resume from, empty when this was the last page
    pub next_page_token: String,
    /// Total records in the registry (unfiltered)
    pub total_count: usize,
}
