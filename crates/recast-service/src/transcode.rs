//! Transcode submission and cancellation.

use std::sync::Arc;

use tracing::info;

use recast_manager::TranscodeManager;
use recast_models::{
    parse_format_list, CancelResponse, TranscodeOptions, TranscodeResponse, VideoFormat,
};

use crate::error::{ServiceError, ServiceResult};

/// Transcode surface: creates jobs and cancels them.
#[derive(Clone)]
pub struct TranscodeService {
    manager: Arc<TranscodeManager>,
    default_formats: String,
}

impl TranscodeService {
    pub fn new(manager: Arc<TranscodeManager>, default_formats: String) -> Self {
        Self {
            manager,
            default_formats,
        }
    }

    /// Create and schedule a job for a staged video.
    ///
    /// An empty container defaults to "mp4". An empty format list is
    /// expanded from the configured default names; an unknown standard
    /// name there is an invalid argument and no job is registered.
    pub async fn transcode(
        &self,
        video_id: &str,
        output_formats: Vec<VideoFormat>,
        output_container: &str,
        options: TranscodeOptions,
    ) -> ServiceResult<TranscodeResponse> {
        let formats = if output_formats.is_empty() {
            parse_format_list(&self.default_formats)?
        } else {
            output_formats
        };
        if formats.is_empty() {
            return Err(ServiceError::invalid_argument("no output formats"));
        }
        let container = if output_container.is_empty() {
            "mp4".to_string()
        } else {
            output_container.to_string()
        };

        let job = self
            .manager
            .create_job(video_id, formats, container, options)
            .await?;
        self.manager.submit(job.job_id.as_str())?;
        info!("Accepted transcode request: job {}", job.job_id);

        Ok(TranscodeResponse {
            job_id: job.job_id.clone(),
            status: job.status,
            estimated_time_seconds: job.estimated_time_remaining_secs,
        })
    }

    /// Cancel a job. Succeeds only for a job that exists and is not
    /// yet terminal.
    pub fn cancel(&self, job_id: &str) -> CancelResponse {
        let success = self.manager.cancel(job_id);
        CancelResponse {
            success,
            error_message: if success {
                None
            } else {
                Some("Could not cancel job. It may be completed, failed, or not found.".to_string())
            },
        }
    }
}
