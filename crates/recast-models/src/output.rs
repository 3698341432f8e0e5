//! Produced output file records.

use serde::{Deserialize, Serialize};

/// A derived file produced by one per-format encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFile {
    /// Format name (e.g. "720p")
    pub format: String,
    /// File path of the output
    pub location: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Duration in seconds
    pub duration_seconds: f64,
    /// Video bitrate in kbps
    pub bitrate_kbps: u32,
}
