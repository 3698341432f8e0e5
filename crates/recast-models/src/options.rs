//! Per-job transcode options.

use serde::{Deserialize, Serialize};

/// Optional encoder settings applied to every format of a job.
///
/// Zero-valued numeric fields mean "not set" and are omitted from the
/// encoder command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscodeOptions {
    /// Audio codec (e.g. "aac"); defaults applied by the driver when absent
    pub audio_codec: Option<String>,
    /// Audio bitrate in kbps
    #[serde(default)]
    pub audio_bitrate_kbps: u32,
    /// Output frame rate
    #[serde(default)]
    pub frame_rate: f32,
    /// Two-pass encoding flag
    #[serde(default)]
    pub two_pass: bool,
    /// Constant rate factor (quality)
    #[serde(default)]
    pub crf: u32,
}
