//! The process-wide job map.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use recast_models::{JobStatus, TranscodeJob};

use crate::handle::JobHandle;

/// Page size used when a listing supplies no positive limit.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Thread-safe mapping from job id to job record.
///
/// The map lock is only ever held for map manipulation; record reads
/// and writes go through each record's own lock.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Arc<JobHandle>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) a job record, returning its handle.
    pub fn insert(&self, job: TranscodeJob) -> Arc<JobHandle> {
        let id = job.job_id.to_string();
        let handle = JobHandle::new(job);
        self.jobs.write().unwrap().insert(id.clone(), handle.clone());
        debug!("Registered job {}", id);
        handle
    }

    /// Point lookup of a record handle.
    pub fn get(&self, job_id: &str) -> Option<Arc<JobHandle>> {
        self.jobs.read().unwrap().get(job_id).cloned()
    }

    /// Point lookup returning an owned snapshot.
    pub fn snapshot(&self, job_id: &str) -> Option<TranscodeJob> {
        self.get(job_id).map(|handle| handle.snapshot())
    }

    /// Remove a record. Returns false when absent.
    pub fn remove(&self, job_id: &str) -> bool {
        self.jobs.write().unwrap().remove(job_id).is_some()
    }

    pub fn count(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    fn handles(&self) -> Vec<Arc<JobHandle>> {
        self.jobs.read().unwrap().values().cloned().collect()
    }

    pub fn list_all(&self) -> Vec<TranscodeJob> {
        self.handles().iter().map(|h| h.snapshot()).collect()
    }

    pub fn list_by_video_id(&self, video_id: &str) -> Vec<TranscodeJob> {
        self.handles()
            .iter()
            .map(|h| h.snapshot())
            .filter(|job| job.video_id.as_str() == video_id)
            .collect()
    }

    pub fn list_by_status(&self, status: JobStatus) -> Vec<TranscodeJob> {
        self.handles()
            .iter()
            .map(|h| h.snapshot())
            .filter(|job| job.status == status)
            .collect()
    }

    /// Filtered, paginated listing.
    ///
    /// - `limit <= 0` falls back to [`DEFAULT_PAGE_SIZE`]
    /// - an empty status set means no status filter
    /// - `page_token` restricts to job ids strictly greater than the
    ///   token (job ids are time-ordered, so this agrees with the
    ///   created_at ordering)
    /// - results are ascending by creation time, first `limit` records
    pub fn list_filtered(
        &self,
        limit: i32,
        statuses: &[JobStatus],
        page_token: Option<&str>,
    ) -> Vec<TranscodeJob> {
        let limit = if limit > 0 {
            limit as usize
        } else {
            DEFAULT_PAGE_SIZE
        };

        let mut jobs: Vec<TranscodeJob> = self
            .handles()
            .iter()
            .map(|h| h.snapshot())
            .filter(|job| statuses.is_empty() || statuses.contains(&job.status))
            .filter(|job| page_token.map_or(true, |token| job.job_id.as_str() > token))
            .collect();
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs.truncate(limit);
        jobs
    }
}
