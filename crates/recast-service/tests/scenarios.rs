//! End-to-end scenarios driven through the service facades with a
//! scripted media driver — no real subprocess is ever spawned.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio_stream::StreamExt;

use recast_media::{MediaDriver, MediaError, MediaResult, ProgressFn};
use recast_models::{
    JobStatus, JobStatusResponse, TranscodeOptions, UploadState, VideoChunk, VideoFormat,
    VideoMetadata,
};
use recast_service::{App, ServiceConfig, ServiceError, StatusService};

const SOURCE_DURATION_SECS: f64 = 120.0;

/// Scripted driver: probe returns fixed metadata, encode writes a
/// small file after an interruptible delay.
struct ScriptedDriver {
    encode_delay: Duration,
    fail_format: Option<String>,
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self {
            encode_delay: Duration::from_millis(10),
            fail_format: None,
        }
    }
}

#[async_trait]
impl MediaDriver for ScriptedDriver {
    async fn probe(&self, source: &Path) -> MediaResult<VideoMetadata> {
        if !source.exists() {
            return Err(MediaError::FileNotFound(source.to_path_buf()));
        }
        Ok(VideoMetadata {
            width: 1920,
            height: 1080,
            duration_seconds: SOURCE_DURATION_SECS,
            bitrate_kbps: 5000,
            video_codec: "h264".into(),
            audio_codec: "aac".into(),
        })
    }

    async fn encode(
        &self,
        _source: &Path,
        output: &Path,
        format: &VideoFormat,
        _options: &TranscodeOptions,
        _duration_seconds: f64,
        mut cancel: watch::Receiver<bool>,
        on_progress: &ProgressFn,
    ) -> MediaResult<()> {
        on_progress(25, &format!("Transcoding {}", format.name));

        let interrupted = tokio::select! {
            _ = tokio::time::sleep(self.encode_delay) => false,
            changed = cancel.changed() => changed.is_ok() && *cancel.borrow(),
        };
        if interrupted || *cancel.borrow() {
            on_progress(-1, &format!("Cancelled {}", format.name));
            return Err(MediaError::Cancelled);
        }

        if self.fail_format.as_deref() == Some(format.name.as_str()) {
            on_progress(-1, "Failed: exit code 1");
            return Err(MediaError::ffmpeg_failed("scripted failure", Some(1)));
        }

        tokio::fs::write(output, b"derived bytes").await?;
        on_progress(100, &format!("Completed {}", format.name));
        Ok(())
    }
}

async fn test_app(driver: ScriptedDriver, default_formats: &str) -> (App, TempDir) {
    dotenvy::dotenv().ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter("recast=debug")
        .with_test_writer()
        .try_init();

    let root = TempDir::new().unwrap();
    let config = ServiceConfig {
        staging_dir: root.path().join("staging"),
        output_dir: root.path().join("output"),
        workers: 2,
        default_formats: default_formats.to_string(),
        ..ServiceConfig::default()
    };
    let app = App::with_driver(config, Arc::new(driver)).await.unwrap();
    (app, root)
}

fn chunk(upload_id: Option<&str>, seq: u64, content: &[u8], last: bool) -> VideoChunk {
    VideoChunk {
        upload_id: upload_id.map(str::to_string),
        filename: "movie.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        sequence_number: seq,
        is_last_chunk: last,
        content: content.to_vec(),
    }
}

/// Drain a status stream to its final (terminal) snapshot.
async fn wait_terminal(status: &StatusService, job_id: &str) -> JobStatusResponse {
    let mut updates = status.stream_job_status(job_id);
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut last = None;
        while let Some(snapshot) = updates.next().await {
            last = Some(snapshot);
        }
        last.expect("stream yielded no snapshots")
    })
    .await
    .expect("job never reached a terminal status")
}

#[tokio::test]
async fn s1_happy_path_upload_then_transcode() {
    let (app, _root) = test_app(ScriptedDriver::default(), "1080p,720p,480p,360p").await;
    let uploads = app.upload_service();
    let transcode = app.transcode_service();
    let status = app.status_service();

    // Three chunks, last one flagged final.
    let parts: Vec<&[u8]> = vec![b"first ", b"second ", b"third"];
    let chunks: Vec<VideoChunk> = parts
        .iter()
        .enumerate()
        .map(|(i, bytes)| chunk(None, i as u64, bytes, i == 2))
        .collect();

    let response = uploads.upload(stream::iter(chunks)).await;
    assert_eq!(response.status, UploadState::Completed);
    let video_id = response.video_id.unwrap();

    // The assembled file is byte-for-byte the chunk concatenation.
    let staged = app.store().locate_video(&video_id).await.unwrap().unwrap();
    assert_eq!(tokio::fs::read(&staged).await.unwrap(), b"first second third");

    let accepted = transcode
        .transcode(
            &video_id,
            vec![VideoFormat::new("720p", 1280, 720, "libx264", 2500)],
            "mp4",
            TranscodeOptions {
                audio_codec: Some("aac".into()),
                audio_bitrate_kbps: 128,
                crf: 23,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(accepted.status, JobStatus::Queued);

    let done = wait_terminal(&status, accepted.job_id.as_str()).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert_eq!(done.output_files.len(), 1);

    let expected = app
        .store()
        .output_path(accepted.job_id.as_str(), &video_id, "720p", "mp4");
    assert_eq!(done.output_files[0].format, "720p");
    assert_eq!(done.output_files[0].location, expected.to_string_lossy());
    assert!(expected.exists());
}

#[tokio::test]
async fn s2_unknown_standard_format_in_defaults() {
    let (app, _root) = test_app(ScriptedDriver::default(), "1080p,999p").await;
    let uploads = app.upload_service();
    let transcode = app.transcode_service();

    let response = uploads
        .upload(stream::iter(vec![chunk(None, 0, b"data", true)]))
        .await;
    let video_id = response.video_id.unwrap();

    // Empty format list expands the defaults; "999p" is rejected
    // before any job exists.
    let err = transcode
        .transcode(&video_id, Vec::new(), "mp4", TranscodeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert_eq!(app.registry().count(), 0);
}

#[tokio::test]
async fn s3_missing_source_registers_nothing() {
    let (app, _root) = test_app(ScriptedDriver::default(), "720p").await;
    let transcode = app.transcode_service();

    let err = transcode
        .transcode(
            "no-such-video",
            Vec::new(),
            "",
            TranscodeOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(app.registry().count(), 0);
}

#[tokio::test]
async fn s4_cancel_mid_flight() {
    let driver = ScriptedDriver {
        encode_delay: Duration::from_secs(30),
        ..Default::default()
    };
    let (app, _root) = test_app(driver, "720p,480p").await;
    let uploads = app.upload_service();
    let transcode = app.transcode_service();
    let status = app.status_service();

    let response = uploads
        .upload(stream::iter(vec![chunk(None, 0, b"data", true)]))
        .await;
    let video_id = response.video_id.unwrap();

    let accepted = transcode
        .transcode(&video_id, Vec::new(), "mp4", TranscodeOptions::default())
        .await
        .unwrap();
    let job_id = accepted.job_id.to_string();

    // Wait for the job to be running with some progress reported.
    let mut updates = status.stream_job_status(&job_id);
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(snapshot) = updates.next().await {
            if snapshot.status == JobStatus::InProgress && snapshot.progress >= 1 {
                break;
            }
        }
    })
    .await
    .unwrap();

    let cancelled = transcode.cancel(&job_id);
    assert!(cancelled.success);

    let done = wait_terminal(&status, &job_id).await;
    assert_eq!(done.status, JobStatus::Cancelled);
    assert!(done.end_time_ms > 0);
    assert!(done.output_files.len() < 2);

    // Terminal status is sticky, and a second cancel fails.
    assert_eq!(status.get_job_status(&job_id).status, JobStatus::Cancelled);
    assert!(!transcode.cancel(&job_id).success);
}

#[tokio::test]
async fn s5_out_of_order_chunks_assemble_in_order() {
    let (app, _root) = test_app(ScriptedDriver::default(), "720p").await;
    let uploads = app.upload_service();

    let chunks = vec![
        chunk(Some("sess-5"), 1, b"BB", false),
        chunk(Some("sess-5"), 0, b"A", false),
        chunk(Some("sess-5"), 2, b"CCC", true),
    ];
    let response = uploads.upload(stream::iter(chunks)).await;
    assert_eq!(response.status, UploadState::Completed);

    let video_id = response.video_id.unwrap();
    let staged = app.store().locate_video(&video_id).await.unwrap().unwrap();
    assert_eq!(tokio::fs::read(&staged).await.unwrap(), b"ABBCCC");
}

#[tokio::test]
async fn s6_paginated_listing_sweep() {
    let (app, _root) = test_app(ScriptedDriver::default(), "360p").await;
    let uploads = app.upload_service();
    let transcode = app.transcode_service();
    let status = app.status_service();

    let mut created = Vec::new();
    for i in 0..5 {
        let response = uploads
            .upload(stream::iter(vec![chunk(None, 0, format!("v{i}").as_bytes(), true)]))
            .await;
        let video_id = response.video_id.unwrap();
        let accepted = transcode
            .transcode(&video_id, Vec::new(), "mp4", TranscodeOptions::default())
            .await
            .unwrap();
        created.push(accepted.job_id.to_string());
    }

    let all_statuses = [
        JobStatus::Queued,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    let page1 = status.list_jobs(2, &all_statuses, "");
    assert_eq!(page1.jobs.len(), 2);
    assert_eq!(page1.next_page_token, page1.jobs[1].job_id);
    assert_eq!(page1.total_count, 5);

    let page2 = status.list_jobs(2, &all_statuses, &page1.next_page_token);
    assert_eq!(page2.jobs.len(), 2);
    assert!(!page2.next_page_token.is_empty());

    let page3 = status.list_jobs(2, &all_statuses, &page2.next_page_token);
    assert_eq!(page3.jobs.len(), 1);
    assert_eq!(page3.next_page_token, "");

    let visited: Vec<String> = page1
        .jobs
        .iter()
        .chain(page2.jobs.iter())
        .chain(page3.jobs.iter())
        .map(|j| j.job_id.clone())
        .collect();
    assert_eq!(visited, created);
}

#[tokio::test]
async fn status_stream_pushes_updates_until_terminal() {
    let (app, _root) = test_app(ScriptedDriver::default(), "720p,480p").await;
    let uploads = app.upload_service();
    let transcode = app.transcode_service();
    let status = app.status_service();

    let response = uploads
        .upload(stream::iter(vec![chunk(None, 0, b"data", true)]))
        .await;
    let video_id = response.video_id.unwrap();
    let accepted = transcode
        .transcode(&video_id, Vec::new(), "mp4", TranscodeOptions::default())
        .await
        .unwrap();

    let snapshots: Vec<JobStatusResponse> = tokio::time::timeout(
        Duration::from_secs(5),
        status.stream_job_status(accepted.job_id.as_str()).collect(),
    )
    .await
    .unwrap();

    assert!(!snapshots.is_empty());
    assert_eq!(snapshots.last().unwrap().status, JobStatus::Completed);
    // Progress never regresses across the stream.
    let progress: Vec<u8> = snapshots.iter().map(|s| s.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
}

#[tokio::test]
async fn status_stream_for_unknown_job() {
    let (app, _root) = test_app(ScriptedDriver::default(), "720p").await;
    let status = app.status_service();

    let snapshots: Vec<JobStatusResponse> =
        status.stream_job_status("no-such-job").collect().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].status, JobStatus::Unknown);
    assert_eq!(snapshots[0].error_message.as_deref(), Some("Job not found"));
}

#[tokio::test]
async fn failed_format_leaves_prefix_of_outputs() {
    let driver = ScriptedDriver {
        fail_format: Some("480p".into()),
        ..Default::default()
    };
    let (app, _root) = test_app(driver, "720p,480p,360p").await;
    let uploads = app.upload_service();
    let transcode = app.transcode_service();
    let status = app.status_service();

    let response = uploads
        .upload(stream::iter(vec![chunk(None, 0, b"data", true)]))
        .await;
    let video_id = response.video_id.unwrap();
    let accepted = transcode
        .transcode(&video_id, Vec::new(), "mp4", TranscodeOptions::default())
        .await
        .unwrap();

    let done = wait_terminal(&status, accepted.job_id.as_str()).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(
        done.error_message.as_deref(),
        Some("Failed to transcode format: 480p")
    );
    let formats: Vec<&str> = done.output_files.iter().map(|f| f.format.as_str()).collect();
    assert_eq!(formats, vec!["720p"]);
}

#[tokio::test]
async fn upload_status_reflects_session_progress() {
    let (app, _root) = test_app(ScriptedDriver::default(), "720p").await;
    let uploads = app.upload_service();

    let unknown = uploads.get_upload_status("missing").await;
    assert_eq!(unknown.status, UploadState::Unknown);

    // A stream that ends before the final chunk: the upload fails but
    // the session reports the partial progress it saw.
    let chunks = vec![
        chunk(Some("sess-p"), 0, b"A", false),
        chunk(Some("sess-p"), 1, b"B", false),
    ];
    let response = uploads.upload(stream::iter(chunks)).await;
    assert_eq!(response.status, UploadState::Failed);

    let partial = uploads.get_upload_status("sess-p").await;
    assert_eq!(partial.status, UploadState::InProgress);
    // Total unknown: coarse ten percent per received chunk.
    assert_eq!(partial.percent_complete, 20);
}

#[tokio::test]
async fn oversized_chunk_fails_the_upload() {
    let (app, _root) = test_app(ScriptedDriver::default(), "720p").await;
    let uploads = app.upload_service();

    let big = vec![0u8; app.config().max_message_size + 1];
    let chunks = vec![
        chunk(Some("sess-big"), 0, &big, false),
        chunk(Some("sess-big"), 1, b"tail", true),
    ];
    let response = uploads.upload(stream::iter(chunks)).await;
    assert_eq!(response.status, UploadState::Failed);

    let after = uploads.get_upload_status("sess-big").await;
    assert_eq!(after.status, UploadState::Failed);
}

#[tokio::test]
async fn chunk_permutations_assemble_identically() {
    let (app, _root) = test_app(ScriptedDriver::default(), "720p").await;
    let uploads = app.upload_service();

    let parts: Vec<&[u8]> = vec![b"aa", b"b", b"cccc", b"dd", b"e"];
    let expected: Vec<u8> = parts.concat();

    for (case, order) in [[0usize, 1, 2, 3, 4], [4, 2, 0, 3, 1], [3, 4, 1, 0, 2]]
        .iter()
        .enumerate()
    {
        let chunks: Vec<VideoChunk> = order
            .iter()
            .map(|&seq| chunk(None, seq as u64, parts[seq], seq == parts.len() - 1))
            .collect();
        let response = uploads.upload(stream::iter(chunks)).await;
        assert_eq!(response.status, UploadState::Completed, "case {case}");

        let video_id = response.video_id.unwrap();
        let staged = app.store().locate_video(&video_id).await.unwrap().unwrap();
        let assembled = tokio::fs::read(&staged).await.unwrap();
        assert_eq!(assembled.len(), expected.len());
        assert_eq!(assembled, expected, "case {case}");
    }
}
