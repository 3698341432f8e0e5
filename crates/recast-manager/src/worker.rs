//! The per-job format loop.

use std::sync::Arc;

use tracing::{error, info};

use recast_models::{JobStatus, OutputFile};
use recast_registry::JobHandle;

use crate::manager::ManagerInner;

/// Drive one job to a terminal status.
///
/// Formats are encoded serially; each format owns the progress window
/// [base, next) so overall progress stays monotonic across the job.
pub(crate) async fn run_job(inner: Arc<ManagerInner>, handle: Arc<JobHandle>) {
    let job = handle.snapshot();
    let job_id = job.job_id.to_string();

    // Cancelled while still queued.
    if job.is_terminal() {
        info!(job_id = %job_id, "Skipping job already in status {}", job.status);
        return;
    }
    if !handle.mark_in_progress() {
        return;
    }
    info!(job_id = %job_id, "Starting transcoding job");

    let total = job.output_formats.len();
    let mut all_ok = true;

    for (index, format) in job.output_formats.iter().enumerate() {
        if handle.status().is_terminal() {
            all_ok = false;
            break;
        }

        let base = (index * 100 / total) as u8;
        let next = ((index + 1) * 100 / total) as u8;
        handle.update_progress(base, &format!("Processing {}", format.name));

        let output_path = inner.store.output_path(
            &job_id,
            job.video_id.as_str(),
            &format.name,
            &job.output_container,
        );

        let window = next - base;
        let progress_handle = handle.clone();
        let on_progress = move |percent: i32, stage: &str| {
            if (0..=100).contains(&percent) {
                let scaled = base + (percent as u32 * window as u32 / 100) as u8;
                progress_handle.update_progress(scaled, stage);
            }
        };

        let result = inner
            .driver
            .encode(
                &job.input_path,
                &output_path,
                format,
                &job.options,
                job.metadata.duration_seconds,
                handle.cancel_signal(),
                &on_progress,
            )
            .await;

        match result {
            Ok(()) => match tokio::fs::metadata(&output_path).await {
                Ok(stat) => handle.add_output_file(OutputFile {
                    format: format.name.clone(),
                    location: output_path.to_string_lossy().to_string(),
                    size_bytes: stat.len(),
                    duration_seconds: job.metadata.duration_seconds,
                    bitrate_kbps: format.bitrate_kbps,
                }),
                Err(e) => {
                    error!(job_id = %job_id, "Error reading output file size: {}", e);
                }
            },
            Err(e) => {
                all_ok = false;
                if handle.status() == JobStatus::Cancelled {
                    info!(job_id = %job_id, "Encode aborted by cancellation");
                } else {
                    error!(job_id = %job_id, "Failed to transcode {}: {}", format.name, e);
                    handle.mark_failed(format!("Failed to transcode format: {}", format.name));
                }
                // Remaining formats are skipped either way.
                break;
            }
        }
    }

    if all_ok {
        handle.mark_completed();
        info!(job_id = %job_id, "Completed transcoding job");
    }
}
