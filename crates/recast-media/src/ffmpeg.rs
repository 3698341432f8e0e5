//! FFmpeg/FFprobe driver.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use recast_models::{TranscodeOptions, VideoFormat, VideoMetadata};

use crate::driver::{MediaDriver, ProgressFn};
use crate::error::{MediaError, MediaResult};

/// Hard wall-clock limit for a probe run.
const PROBE_TIMEOUT_SECS: u64 = 30;

/// Production driver spawning the external probe and encoder binaries.
#[derive(Debug, Clone)]
pub struct FfmpegDriver {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegDriver {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Resolve both binaries, failing fast when either is absent.
    pub fn check_binaries(&self) -> MediaResult<()> {
        which::which(&self.ffmpeg)
            .map_err(|_| MediaError::FfmpegNotFound(self.ffmpeg.clone()))?;
        which::which(&self.ffprobe)
            .map_err(|_| MediaError::FfprobeNotFound(self.ffprobe.clone()))?;
        Ok(())
    }
}

#[async_trait]
impl MediaDriver for FfmpegDriver {
    async fn probe(&self, source: &Path) -> MediaResult<VideoMetadata> {
        if !source.exists() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }
        which::which(&self.ffprobe)
            .map_err(|_| MediaError::FfprobeNotFound(self.ffprobe.clone()))?;

        let mut cmd = Command::new(&self.ffprobe);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(source)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        // kill_on_drop reaps the subprocess when the timeout drops the
        // in-flight future.
        let output = match tokio::time::timeout(
            Duration::from_secs(PROBE_TIMEOUT_SECS),
            cmd.output(),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Probe timed out after {} seconds: {}",
                    PROBE_TIMEOUT_SECS,
                    source.display()
                );
                return Err(MediaError::Timeout(PROBE_TIMEOUT_SECS));
            }
        };

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: format!("probe exited with {:?}", output.status.code()),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            });
        }

        parse_probe_output(&output.stdout)
    }

    async fn encode(
        &self,
        source: &Path,
        output: &Path,
        format: &VideoFormat,
        options: &TranscodeOptions,
        duration_seconds: f64,
        mut cancel: watch::Receiver<bool>,
        on_progress: &ProgressFn,
    ) -> MediaResult<()> {
        if which::which(&self.ffmpeg).is_err() {
            let err = MediaError::FfmpegNotFound(self.ffmpeg.clone());
            on_progress(-1, &format!("Error: {err}"));
            return Err(err);
        }

        let args = build_encode_args(source, output, format, options);
        info!(
            "Encoder command: {} {}",
            self.ffmpeg.display(),
            args.join(" ")
        );

        let mut child = match Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                on_progress(-1, &format!("Error: {e}"));
                return Err(e.into());
            }
        };

        // Merge stdout and stderr into one line stream; the channel
        // closes once both pipes do, which happens at process exit.
        let (line_tx, mut line_rx) = mpsc::channel::<String>(64);
        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");
        tokio::spawn(pump_lines(stdout, line_tx.clone()));
        tokio::spawn(pump_lines(stderr, line_tx));

        let stage = format!("Transcoding {}", format.name);
        let run = async {
            while let Some(line) = line_rx.recv().await {
                if let Some(position) = parse_time_position(&line) {
                    let percent = if duration_seconds > 0.0 {
                        ((position / duration_seconds) * 100.0).clamp(0.0, 100.0) as i32
                    } else {
                        0
                    };
                    on_progress(percent, &stage);
                }
                debug!("ffmpeg: {}", line);
            }
            child.wait().await
        };

        let exit = tokio::select! {
            exit = run => Some(exit),
            _ = wait_for_cancel(&mut cancel) => None,
        };

        let Some(exit) = exit else {
            info!("Encode cancelled, killing subprocess");
            let _ = child.kill().await;
            on_progress(-1, &format!("Cancelled {}", format.name));
            return Err(MediaError::Cancelled);
        };

        match exit {
            Ok(status) if status.success() => {
                on_progress(100, &format!("Completed {}", format.name));
                Ok(())
            }
            Ok(status) => {
                let message = format!("Failed: exit code {:?}", status.code());
                on_progress(-1, &message);
                Err(MediaError::ffmpeg_failed(message, status.code()))
            }
            Err(e) => {
                on_progress(-1, &format!("Error: {e}"));
                Err(e.into())
            }
        }
    }
}

/// Forward lines from a child pipe into the merged channel.
async fn pump_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

/// Resolve once the cancel flag flips to true; never resolves when the
/// sender side has gone away without cancelling.
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Build the encoder argument list.
///
/// The order is a fixed contract: input, video codec, frame size,
/// video bitrate, two-pass flag, CRF, frame rate, audio settings,
/// overwrite flag, output.
pub fn build_encode_args(
    source: &Path,
    output: &Path,
    format: &VideoFormat,
    options: &TranscodeOptions,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-i".into(),
        source.to_string_lossy().to_string(),
        "-c:v".into(),
        format.video_codec.clone(),
        "-s".into(),
        format.frame_size(),
    ];

    if format.bitrate_kbps > 0 {
        args.push("-b:v".into());
        args.push(format!("{}k", format.bitrate_kbps));
    }

    if options.two_pass {
        args.push("-pass".into());
        args.push("1".into());
    }

    if options.crf > 0 {
        args.push("-crf".into());
        args.push(options.crf.to_string());
    }

    if options.frame_rate > 0.0 {
        args.push("-r".into());
        args.push(options.frame_rate.to_string());
    }

    match &options.audio_codec {
        Some(codec) => {
            args.push("-c:a".into());
            args.push(codec.clone());
            if options.audio_bitrate_kbps > 0 {
                args.push("-b:a".into());
                args.push(format!("{}k", options.audio_bitrate_kbps));
            }
        }
        None => {
            args.push("-c:a".into());
            args.push("aac".into());
            args.push("-b:a".into());
            args.push("128k".into());
        }
    }

    args.push("-y".into());
    args.push(output.to_string_lossy().to_string());
    args
}

/// Extract the current time position from an encoder progress line,
/// e.g. `frame= 120 fps= 30 ... time=00:01:05.20 bitrate=...`.
pub fn parse_time_position(line: &str) -> Option<f64> {
    let idx = line.find("time=")?;
    let token: String = line[idx + 5..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ':' || *c == '.')
        .collect();

    let mut parts = token.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// FFprobe JSON output shape.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse probe JSON into metadata.
///
/// Duration is mandatory; anything else missing falls back to a
/// neutral default.
fn parse_probe_output(bytes: &[u8]) -> MediaResult<VideoMetadata> {
    let probe: FfprobeOutput = serde_json::from_slice(bytes)?;

    let duration_seconds = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| MediaError::InvalidVideo("no duration in probe output".to_string()))?;

    let bitrate_kbps = probe
        .format
        .bit_rate
        .as_deref()
        .and_then(|b| b.parse::<u64>().ok())
        .map(|bps| (bps / 1000) as u32)
        .unwrap_or(0);

    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio = probe.streams.iter().find(|s| s.codec_type == "audio");

    Ok(VideoMetadata {
        width: video.and_then(|s| s.width).unwrap_or(0),
        height: video.and_then(|s| s.height).unwrap_or(0),
        duration_seconds,
        bitrate_kbps,
        video_codec: video
            .and_then(|s| s.codec_name.clone())
            .unwrap_or_default(),
        audio_codec: audio
            .and_then(|s| s.codec_name.clone())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_args_contract_order() {
        let format = VideoFormat::standard("720p").unwrap();
        let options = TranscodeOptions {
            audio_codec: Some("aac".into()),
            audio_bitrate_kbps: 128,
            frame_rate: 0.0,
            two_pass: false,
            crf: 23,
        };
        let args = build_encode_args(
            Path::new("/in/v.mp4"),
            Path::new("/out/v_720p.mp4"),
            &format,
            &options,
        );
        assert_eq!(
            args,
            vec![
                "-i", "/in/v.mp4", "-c:v", "libx264", "-s", "1280x720", "-b:v", "2500k",
                "-crf", "23", "-c:a", "aac", "-b:a", "128k", "-y", "/out/v_720p.mp4",
            ]
        );
    }

    #[test]
    fn test_encode_args_defaults_and_flags() {
        let format = VideoFormat::new("custom", 640, 360, "libx265", 0);
        let options = TranscodeOptions {
            two_pass: true,
            frame_rate: 24.0,
            ..Default::default()
        };
        let args = build_encode_args(
            Path::new("in.mov"),
            Path::new("out.mkv"),
            &format,
            &options,
        );
        // Zero bitrate is omitted, two-pass and frame rate are present,
        // absent audio options fall back to aac/128k.
        assert_eq!(
            args,
            vec![
                "-i", "in.mov", "-c:v", "libx265", "-s", "640x360", "-pass", "1", "-r",
                "24", "-c:a", "aac", "-b:a", "128k", "-y", "out.mkv",
            ]
        );
    }

    #[test]
    fn test_parse_time_position() {
        let line = "frame=  120 fps= 30 q=28.0 size=1024kB time=00:01:05.20 bitrate=2000kbits/s";
        let secs = parse_time_position(line).unwrap();
        assert!((secs - 65.2).abs() < 1e-9);

        assert_eq!(parse_time_position("time=10:00:00.00"), Some(36000.0));
        assert_eq!(parse_time_position("no position here"), None);
        assert_eq!(parse_time_position("time=N/A bitrate=N/A"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "format": {"duration": "120.5", "bit_rate": "5000000"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;
        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.width, 1920);
        assert_eq!(meta.height, 1080);
        assert!((meta.duration_seconds - 120.5).abs() < 1e-9);
        assert_eq!(meta.bitrate_kbps, 5000);
        assert_eq!(meta.video_codec, "h264");
        assert_eq!(meta.audio_codec, "aac");
    }

    #[test]
    fn test_probe_requires_duration() {
        let json = br#"{"format": {}, "streams": []}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidVideo(_))
        ));
    }
}
