//! Probed source video metadata.

use serde::{Deserialize, Serialize};

/// Metadata extracted from a source video by the probe tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Duration in seconds
    pub duration_seconds: f64,
    /// Overall bitrate in kbps
    pub bitrate_kbps: u32,
    /// Video codec name
    pub video_codec: String,
    /// Audio codec name
    pub audio_codec: String,
}
