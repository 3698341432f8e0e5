//! Status queries, status streams and job listings.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use recast_models::{JobStatus, JobStatusResponse, ListJobsResponse};
use recast_registry::{JobRegistry, DEFAULT_PAGE_SIZE};

/// Status surface: point queries, live streams, paginated listings.
#[derive(Clone)]
pub struct StatusService {
    registry: Arc<JobRegistry>,
}

impl StatusService {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    /// Snapshot of one job; Unknown when no such job exists.
    pub fn get_job_status(&self, job_id: &str) -> JobStatusResponse {
        match self.registry.snapshot(job_id) {
            Some(job) => JobStatusResponse::from(&job),
            None => JobStatusResponse::unknown(job_id),
        }
    }

    /// Stream of job snapshots: the current state immediately, then
    /// one per observed change (coalesced to latest), closing after a
    /// terminal snapshot. For an unknown job the stream carries a
    /// single Unknown response.
    ///
    /// Dropping the stream just ends the subscription; server state is
    /// untouched.
    pub fn stream_job_status(&self, job_id: &str) -> ReceiverStream<JobStatusResponse> {
        let (tx, rx) = mpsc::channel(16);

        match self.registry.get(job_id) {
            None => {
                let _ = tx.try_send(JobStatusResponse::unknown(job_id));
            }
            Some(handle) => {
                let job_id = job_id.to_string();
                let mut updates = handle.subscribe();
                tokio::spawn(async move {
                    loop {
                        let snapshot = updates.borrow_and_update().clone();
                        let terminal = snapshot.is_terminal();
                        if tx.send(JobStatusResponse::from(&snapshot)).await.is_err() {
                            debug!("Status stream for {} dropped by client", job_id);
                            break;
                        }
                        if terminal {
                            break;
                        }
                        if updates.changed().await.is_err() {
                            break;
                        }
                    }
                });
            }
        }

        ReceiverStream::new(rx)
    }

    /// Filtered, paginated job listing.
    pub fn list_jobs(
        &self,
        limit: i32,
        status_filter: &[JobStatus],
        page_token: &str,
    ) -> ListJobsResponse {
        let token = (!page_token.is_empty()).then_some(page_token);
        let page_size = if limit > 0 {
            limit as usize
        } else {
            DEFAULT_PAGE_SIZE
        };

        let jobs = self.registry.list_filtered(limit, status_filter, token);

        // A full page may have more behind it; resume from the last id.
        let next_page_token = if jobs.len() == page_size {
            jobs.last()
                .map(|job| job.job_id.to_string())
                .unwrap_or_default()
        } else {
            String::new()
        };

        ListJobsResponse {
            jobs: jobs.iter().map(JobStatusResponse::from).collect(),
            next_page_token,
            total_count: self.registry.count(),
        }
    }
}
