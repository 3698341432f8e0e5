//! Job creation, submission and cancellation.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{error, info, warn};

use recast_media::MediaDriver;
use recast_models::{TranscodeJob, TranscodeOptions, VideoFormat, VideoId};
use recast_registry::JobRegistry;
use recast_storage::MediaStore;

use crate::error::{ManagerError, ManagerResult};
use crate::worker::run_job;

/// Shared state handed to worker tasks.
pub(crate) struct ManagerInner {
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) store: MediaStore,
    pub(crate) driver: Arc<dyn MediaDriver>,
}

/// The scheduler: creates jobs and drives them on a bounded pool.
pub struct TranscodeManager {
    inner: Arc<ManagerInner>,
    queue_tx: mpsc::UnboundedSender<String>,
    shutdown: watch::Sender<bool>,
}

impl TranscodeManager {
    /// Create the manager and start its dispatcher.
    ///
    /// `workers` bounds how many jobs run concurrently; submission is
    /// never rejected, excess jobs simply queue.
    pub fn new(
        store: MediaStore,
        registry: Arc<JobRegistry>,
        driver: Arc<dyn MediaDriver>,
        workers: usize,
    ) -> Self {
        let inner = Arc::new(ManagerInner {
            registry,
            store,
            driver,
        });
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let workers = workers.max(1);
        info!("Starting transcode manager with {} workers", workers);
        tokio::spawn(dispatch(inner.clone(), queue_rx, shutdown_rx, workers));

        Self {
            inner,
            queue_tx,
            shutdown,
        }
    }

    /// Create a new job for a staged video.
    ///
    /// The staged source is located and probed first; if either fails
    /// the job is never registered.
    pub async fn create_job(
        &self,
        video_id: &str,
        output_formats: Vec<VideoFormat>,
        output_container: String,
        options: TranscodeOptions,
    ) -> ManagerResult<TranscodeJob> {
        let input_path = self
            .inner
            .store
            .locate_video(video_id)
            .await?
            .ok_or_else(|| ManagerError::VideoNotFound(video_id.to_string()))?;

        let metadata = self.inner.driver.probe(&input_path).await?;

        let mut job = TranscodeJob::create(VideoId::from_string(video_id), input_path);
        job.output_dir = self
            .inner
            .store
            .create_job_output_dir(job.job_id.as_str())
            .await?;
        job.output_container = output_container;
        job.options = options;

        // Rough estimate: half a minute of work per source minute per
        // requested format.
        let duration_minutes = metadata.duration_seconds / 60.0;
        let estimated_minutes =
            (duration_minutes * output_formats.len() as f64 * 0.5).round() as u32;
        job.estimated_time_remaining_secs = estimated_minutes * 60;
        job.output_formats = output_formats;
        job.metadata = metadata;

        let handle = self.inner.registry.insert(job);
        let snapshot = handle.snapshot();
        info!(
            "Created transcoding job {} for video {}",
            snapshot.job_id, video_id
        );
        Ok(snapshot)
    }

    /// Hand a job to the worker pool. Returns immediately.
    pub fn submit(&self, job_id: &str) -> ManagerResult<()> {
        if self.inner.registry.get(job_id).is_none() {
            return Err(ManagerError::JobNotFound(job_id.to_string()));
        }
        self.queue_tx
            .send(job_id.to_string())
            .map_err(|_| ManagerError::Shutdown)
    }

    /// Cancel a job.
    ///
    /// Returns false when the job is missing or already terminal.
    /// Otherwise the record goes to Cancelled and the job's cancel
    /// signal is flipped, killing any running subprocess.
    pub fn cancel(&self, job_id: &str) -> bool {
        let Some(handle) = self.inner.registry.get(job_id) else {
            return false;
        };
        let cancelled = handle.mark_cancelled();
        if cancelled {
            info!("Cancelled job: {}", job_id);
        }
        cancelled
    }

    /// Stop the dispatcher. Jobs already running finish; queued jobs
    /// are dropped.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Pull jobs off the queue and run each under a pool permit.
async fn dispatch(
    inner: Arc<ManagerInner>,
    mut queue_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
    workers: usize,
) {
    let pool = Arc::new(Semaphore::new(workers));
    loop {
        let job_id = tokio::select! {
            changed = shutdown_rx.changed() => {
                // A closed channel means the manager itself is gone.
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received, stopping dispatcher");
                    break;
                }
                continue;
            }
            received = queue_rx.recv() => match received {
                Some(job_id) => job_id,
                None => break,
            },
        };

        let permit = pool
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore closed");
        let inner = inner.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let Some(handle) = inner.registry.get(&job_id) else {
                warn!("Dropped job {}: no registry entry", job_id);
                return;
            };
            // A panicking job must never take the pool down; run it on
            // its own task and convert a panic into a failed record.
            let run = tokio::spawn(run_job(inner.clone(), handle.clone()));
            if let Err(join_error) = run.await {
                error!("Job {} panicked: {}", job_id, join_error);
                handle.mark_failed(format!("Internal error: {join_error}"));
            }
        });
    }
    info!("Dispatcher stopped");
}
