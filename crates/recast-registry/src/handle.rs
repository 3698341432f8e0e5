//! Per-job record handle.

use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use recast_models::{JobStatus, OutputFile, TranscodeJob};

/// A job record behind its own lock, with snapshot fan-out and a
/// cancellation signal.
///
/// Workers mutate the record through this handle; every mutation
/// publishes a fresh snapshot to subscribers (coalesced to latest by
/// `watch` semantics). The record invariants themselves — absorbing
/// terminal statuses, monotonic progress — live on
/// [`TranscodeJob`]; the handle only adds locking and publication.
#[derive(Debug)]
pub struct JobHandle {
    job: RwLock<TranscodeJob>,
    updates: watch::Sender<TranscodeJob>,
    cancel: watch::Sender<bool>,
}

impl JobHandle {
    pub(crate) fn new(job: TranscodeJob) -> Arc<Self> {
        let (updates, _) = watch::channel(job.clone());
        let (cancel, _) = watch::channel(false);
        Arc::new(Self {
            job: RwLock::new(job),
            updates,
            cancel,
        })
    }

    /// Owned point-in-time copy of the record.
    pub fn snapshot(&self) -> TranscodeJob {
        self.job.read().unwrap().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.job.read().unwrap().status
    }

    /// Subscribe to record snapshots. The receiver starts at the
    /// latest published state.
    pub fn subscribe(&self) -> watch::Receiver<TranscodeJob> {
        self.updates.subscribe()
    }

    /// The cancellation flag handed to the running encode.
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut TranscodeJob) -> R) -> R {
        let mut job = self.job.write().unwrap();
        let result = f(&mut job);
        self.updates.send_replace(job.clone());
        result
    }

    pub fn mark_in_progress(&self) -> bool {
        self.mutate(|job| job.mark_in_progress())
    }

    pub fn update_progress(&self, percent: u8, stage: &str) {
        self.mutate(|job| job.update_progress(percent, stage));
    }

    pub fn add_output_file(&self, file: OutputFile) {
        self.mutate(|job| job.add_output_file(file));
    }

    pub fn mark_completed(&self) {
        self.mutate(|job| job.mark_completed());
    }

    pub fn mark_failed(&self, error: impl Into<String>) {
        self.mutate(|job| job.mark_failed(error));
    }

    /// Mark the job cancelled and flip the cancellation signal so a
    /// running subprocess gets killed. Returns false once terminal.
    pub fn mark_cancelled(&self) -> bool {
        let cancelled = self.mutate(|job| job.mark_cancelled());
        if cancelled {
            self.cancel.send_replace(true);
        }
        cancelled
    }
}
