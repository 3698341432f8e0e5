//! Process-wide configuration.

use std::path::PathBuf;

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root for chunks and assembled source videos
    pub staging_dir: PathBuf,
    /// Root for per-job output subdirectories
    pub output_dir: PathBuf,
    /// Worker pool size
    pub workers: usize,
    /// Comma-separated standard format names used when a transcode
    /// request supplies none
    pub default_formats: String,
    /// Encoder binary
    pub ffmpeg_path: PathBuf,
    /// Probe binary
    pub ffprobe_path: PathBuf,
    /// Largest accepted upload chunk, in bytes
    pub max_message_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("./data/staging"),
            output_dir: PathBuf::from("./data/output"),
            workers: 5,
            default_formats: "1080p,720p,480p,360p".to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            max_message_size: 4 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Create config from environment variables, falling back to the
    /// defaults above.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            staging_dir: std::env::var("RECAST_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            output_dir: std::env::var("RECAST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            workers: std::env::var("RECAST_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.workers),
            default_formats: std::env::var("RECAST_DEFAULT_FORMATS")
                .unwrap_or(defaults.default_formats),
            ffmpeg_path: std::env::var("RECAST_FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: std::env::var("RECAST_FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffprobe_path),
            max_message_size: std::env::var("RECAST_MAX_MESSAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_message_size),
        }
    }
}
