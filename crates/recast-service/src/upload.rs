//! Client-streamed chunk uploads.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tracing::{info, warn};

use recast_models::{UploadId, UploadResponse, UploadState, UploadStatusResponse, VideoChunk};
use recast_storage::{MediaStore, SessionStatus, SessionTable};

/// Upload surface: consumes chunk streams and answers status queries.
#[derive(Clone)]
pub struct UploadService {
    store: MediaStore,
    sessions: Arc<SessionTable>,
    max_message_size: usize,
}

impl UploadService {
    pub fn new(store: MediaStore, sessions: Arc<SessionTable>, max_message_size: usize) -> Self {
        Self {
            store,
            sessions,
            max_message_size,
        }
    }

    /// Consume one upload stream to completion.
    ///
    /// The first chunk opens the session (adopting a client-supplied
    /// upload id when present). A chunk that fails to persist is
    /// dropped and recorded as a session error; the stream keeps
    /// draining so the client gets one coherent response at the end.
    /// On stream end a complete session is assembled and its video id
    /// returned; anything else fails the upload.
    pub async fn upload<S>(&self, mut chunks: S) -> UploadResponse
    where
        S: Stream<Item = VideoChunk> + Unpin,
    {
        let mut upload_id: Option<UploadId> = None;

        while let Some(chunk) = chunks.next().await {
            let id = match &upload_id {
                Some(id) => id.clone(),
                None => {
                    let id = self.sessions.open(
                        chunk.upload_id.clone(),
                        &chunk.filename,
                        &chunk.content_type,
                    );
                    upload_id = Some(id.clone());
                    id
                }
            };

            if chunk.content.len() > self.max_message_size {
                self.sessions
                    .set_error(
                        id.as_str(),
                        format!(
                            "Chunk {} exceeds maximum message size ({} > {})",
                            chunk.sequence_number,
                            chunk.content.len(),
                            self.max_message_size
                        ),
                    )
                    .await;
                continue;
            }

            match self
                .store
                .put_chunk(id.as_str(), chunk.sequence_number, &chunk.content)
                .await
            {
                Ok(path) => {
                    if let Err(e) = self
                        .sessions
                        .record_chunk(id.as_str(), chunk.sequence_number, path, chunk.is_last_chunk)
                        .await
                    {
                        self.sessions.set_error(id.as_str(), e.to_string()).await;
                    }
                }
                Err(e) => {
                    // The chunk is lost but the session survives.
                    self.sessions
                        .set_error(id.as_str(), format!("Failed to save chunk: {e}"))
                        .await;
                }
            }
        }

        let Some(id) = upload_id else {
            return UploadResponse::failed("Upload stream contained no chunks");
        };

        if let SessionStatus::Failed(message) = self.sessions.status(id.as_str()).await {
            warn!("Upload {} failed: {}", id, message);
            return UploadResponse::failed(message);
        }

        match self.sessions.finish(id.as_str(), &self.store).await {
            Ok(video_id) => {
                info!("Upload {} completed, video id {}", id, video_id);
                UploadResponse::completed(video_id.to_string())
            }
            Err(e) => UploadResponse::failed(format!("Upload failed: {e}")),
        }
    }

    /// Status of an upload session.
    pub async fn get_upload_status(&self, upload_id: &str) -> UploadStatusResponse {
        match self.sessions.status(upload_id).await {
            SessionStatus::Unknown => UploadStatusResponse {
                status: UploadState::Unknown,
                percent_complete: 0,
                video_id: None,
                error_message: Some("Upload session not found".to_string()),
            },
            SessionStatus::Failed(message) => UploadStatusResponse {
                status: UploadState::Failed,
                percent_complete: 0,
                video_id: None,
                error_message: Some(message),
            },
            SessionStatus::Completed(video_id) => UploadStatusResponse {
                status: UploadState::Completed,
                percent_complete: 100,
                video_id: Some(video_id.to_string()),
                error_message: None,
            },
            SessionStatus::InProgress(percent) => UploadStatusResponse {
                status: UploadState::InProgress,
                percent_complete: percent,
                video_id: None,
                error_message: None,
            },
        }
    }
}
