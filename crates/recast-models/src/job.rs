//! Transcoding job record and lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{JobId, OutputFile, TranscodeOptions, VideoFormat, VideoId, VideoMetadata};

/// Job status.
///
/// `Unknown` only ever appears at the service boundary (lookups for a
/// job id that does not exist); the registry never stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No such job
    Unknown,
    /// Waiting for a worker
    #[default]
    Queued,
    /// A worker is processing the job
    InProgress,
    /// All formats produced successfully
    Completed,
    /// A format encode failed
    Failed,
    /// Cancelled by a client
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Unknown => "unknown",
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses are absorbing: once reached, the record never
    /// changes status again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request to produce one or more derived files from a source video.
///
/// All mutators uphold the record invariants: terminal statuses are
/// absorbing, and progress never decreases while the job is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Source video ID
    pub video_id: VideoId,
    /// Path to the staged input file
    pub input_path: PathBuf,
    /// Per-job output directory
    pub output_dir: PathBuf,
    /// Ordered list of target formats
    pub output_formats: Vec<VideoFormat>,
    /// Output container (e.g. "mp4")
    pub output_container: String,
    /// Encoder options
    pub options: TranscodeOptions,
    /// Current status
    pub status: JobStatus,
    /// Error message (if failed)
    pub error_message: Option<String>,
    /// Probed source metadata
    pub metadata: VideoMetadata,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// When a worker picked the job up
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    /// Overall progress (0-100)
    pub progress: u8,
    /// Human-readable current stage
    pub current_stage: Option<String>,
    /// Output files produced so far, in request order
    pub output_files: Vec<OutputFile>,
    /// Rough estimate of seconds remaining
    pub estimated_time_remaining_secs: u32,
}

impl TranscodeJob {
    /// Create a new job in `Queued` status.
    pub fn create(video_id: VideoId, input_path: impl Into<PathBuf>) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            input_path: input_path.into(),
            output_dir: PathBuf::new(),
            output_formats: Vec::new(),
            output_container: String::new(),
            options: TranscodeOptions::default(),
            status: JobStatus::Queued,
            error_message: None,
            metadata: VideoMetadata::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: 0,
            current_stage: None,
            output_files: Vec::new(),
            estimated_time_remaining_secs: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition `Queued` -> `InProgress`. Returns false (and leaves
    /// the record untouched) from any other status.
    pub fn mark_in_progress(&mut self) -> bool {
        if self.status != JobStatus::Queued {
            return false;
        }
        self.status = JobStatus::InProgress;
        self.started_at = Some(Utc::now());
        true
    }

    /// Update progress and stage. Ignored once terminal; progress is
    /// clamped so it never moves backwards.
    pub fn update_progress(&mut self, percent: u8, stage: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.progress = self.progress.max(percent.min(100));
        self.current_stage = Some(stage.into());
    }

    /// Record a produced output file.
    ///
    /// Permitted while running, and also on a cancelled job for the
    /// file the in-flight encode had already produced; a completed or
    /// failed job acquires nothing new.
    pub fn add_output_file(&mut self, file: OutputFile) {
        if matches!(self.status, JobStatus::InProgress | JobStatus::Cancelled) {
            self.output_files.push(file);
        }
    }

    /// Mark the job completed. Ignored once terminal.
    pub fn mark_completed(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.progress = 100;
    }

    /// Mark the job failed with an error message. Ignored once terminal.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error.into());
    }

    /// Mark the job cancelled. Returns false once terminal.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        true
    }
}
