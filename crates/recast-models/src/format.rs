//! Target video formats.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when a standard format name is not recognized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unknown format: {0}")]
    UnknownFormat(String),
}

/// A target output format: frame size, codec and video bitrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    /// Format name (e.g. "1080p", "720p")
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Video codec (e.g. "libx264")
    pub video_codec: String,
    /// Video bitrate in kbps
    pub bitrate_kbps: u32,
}

impl VideoFormat {
    /// Create an arbitrary format tuple.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        video_codec: impl Into<String>,
        bitrate_kbps: u32,
    ) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            video_codec: video_codec.into(),
            bitrate_kbps,
        }
    }

    /// Expand a standard format name into its predefined tuple.
    ///
    /// Only the well-known ladder names are accepted here; arbitrary
    /// tuples can always be supplied directly via [`VideoFormat::new`].
    pub fn standard(name: &str) -> Result<Self, FormatError> {
        let (width, height, bitrate_kbps) = match name {
            "1080p" => (1920, 1080, 5000),
            "720p" => (1280, 720, 2500),
            "480p" => (854, 480, 1000),
            "360p" => (640, 360, 750),
            other => return Err(FormatError::UnknownFormat(other.to_string())),
        };
        Ok(Self {
            name: name.to_string(),
            width,
            height,
            video_codec: "libx264".to_string(),
            bitrate_kbps,
        })
    }

    /// Frame size as an ffmpeg `-s` argument value.
    pub fn frame_size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Parse a comma-separated list of standard format names.
pub fn parse_format_list(names: &str) -> Result<Vec<VideoFormat>, FormatError> {
    names
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(VideoFormat::standard)
        .collect()
}
