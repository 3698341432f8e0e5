//! Media driver capability set.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::watch;

use recast_models::{TranscodeOptions, VideoFormat, VideoMetadata};

use crate::error::MediaResult;

/// Progress callback: `(percent, stage)`.
///
/// Percent is 0..=100 during a healthy encode; a failure is reported
/// once as `(-1, message)` before the call returns the error.
pub type ProgressFn = dyn Fn(i32, &str) + Send + Sync;

/// The probe/encode capability set of an external media processor.
///
/// Both calls block the calling task until the subprocess exits; they
/// are intended to be invoked from worker tasks.
#[async_trait]
pub trait MediaDriver: Send + Sync {
    /// Inspect a source file and return its metadata. Bounded by a
    /// hard wall-clock timeout; the subprocess is force-killed on
    /// breach.
    async fn probe(&self, source: &Path) -> MediaResult<VideoMetadata>;

    /// Produce one derived file for `format`, reporting progress until
    /// the subprocess exits. `duration_seconds` is the probed source
    /// duration used to turn time positions into percentages. Flipping
    /// `cancel` to true kills the subprocess and fails the encode with
    /// a cancellation error.
    #[allow(clippy::too_many_arguments)]
    async fn encode(
        &self,
        source: &Path,
        output: &Path,
        format: &VideoFormat,
        options: &TranscodeOptions,
        duration_seconds: f64,
        cancel: watch::Receiver<bool>,
        on_progress: &ProgressFn,
    ) -> MediaResult<()>;
}
