//! External media tool adapter.
//!
//! This crate provides:
//! - [`MediaDriver`]: the probe/encode capability set, as a trait so
//!   tests can inject a scripted driver without spawning subprocesses
//! - [`FfmpegDriver`]: the production implementation driving ffprobe
//!   and ffmpeg, with line-oriented progress parsing, a hard probe
//!   timeout and preemptive cancellation

pub mod driver;
pub mod error;
pub mod ffmpeg;

pub use driver::{MediaDriver, ProgressFn};
pub use error::{MediaError, MediaResult};
pub use ffmpeg::FfmpegDriver;
