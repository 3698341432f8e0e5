//! Upload session state machines.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use recast_models::{UploadId, VideoId};

use crate::error::{StorageError, StorageResult};
use crate::store::MediaStore;

/// Server-side state of one in-progress chunked upload.
#[derive(Debug)]
pub struct UploadSession {
    pub upload_id: UploadId,
    pub filename: String,
    pub content_type: String,
    /// Sequence number -> persisted chunk path
    pub chunks: BTreeMap<u64, PathBuf>,
    /// Whether the chunk flagged final has arrived
    pub last_chunk_seen: bool,
    /// Fixed by the final chunk: its sequence number + 1
    pub total_chunks: Option<u64>,
    pub assembled: bool,
    /// Assigned on successful assembly
    pub video_id: Option<VideoId>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    fn new(upload_id: UploadId, filename: &str, content_type: &str) -> Self {
        Self {
            upload_id,
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            chunks: BTreeMap::new(),
            last_chunk_seen: false,
            total_chunks: None,
            assembled: false,
            video_id: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// A session is complete once the final chunk has been seen and
    /// every sequence number in range has a persisted chunk.
    pub fn is_complete(&self) -> bool {
        self.last_chunk_seen
            && self
                .total_chunks
                .is_some_and(|total| self.chunks.len() as u64 == total)
    }

    /// Percent complete, from the number of chunks received.
    ///
    /// Before the final chunk fixes the total this is a coarse guess of
    /// ten percent per chunk. Derived from the chunk count, not the
    /// highest sequence seen, so out-of-order arrival reports sanely.
    pub fn percent_complete(&self) -> u8 {
        let received = self.chunks.len() as u64;
        let percent = match self.total_chunks {
            Some(total) if total > 0 => received * 100 / total,
            _ => received * 10,
        };
        percent.min(100) as u8
    }

    /// File extension of the original filename, dot included; empty
    /// when the filename has none.
    pub fn file_extension(&self) -> &str {
        match self.filename.rfind('.') {
            Some(idx) => &self.filename[idx..],
            None => "",
        }
    }
}

/// Observable status of a session, as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Unknown,
    Failed(String),
    Completed(VideoId),
    InProgress(u8),
}

/// Process-wide table of upload sessions, keyed by upload id.
///
/// Each session sits behind its own async lock, so operations on
/// different uploads never contend, and assembly of one upload does
/// not block chunk arrival on another.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<String, Arc<Mutex<UploadSession>>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, upload_id: &str) -> Option<Arc<Mutex<UploadSession>>> {
        self.sessions.read().unwrap().get(upload_id).cloned()
    }

    /// Open a session, generating an upload id iff the client supplied
    /// none. A supplied id replaces any stale session under that id.
    pub fn open(&self, upload_id: Option<String>, filename: &str, content_type: &str) -> UploadId {
        let id = match upload_id {
            Some(id) if !id.is_empty() => UploadId::from_string(id),
            _ => UploadId::new(),
        };
        let session = UploadSession::new(id.clone(), filename, content_type);
        self.sessions
            .write()
            .unwrap()
            .insert(id.to_string(), Arc::new(Mutex::new(session)));
        info!("Opened upload session: {}, filename: {}", id, filename);
        id
    }

    /// Register a persisted chunk.
    ///
    /// The final chunk fixes `total_chunks = seq + 1`; after that, any
    /// arrival with `seq >= total_chunks` is a protocol error. Chunks
    /// may otherwise arrive in any order, and a repeated sequence
    /// number replaces the earlier mapping — but only until assembly
    /// consumes the map; a chunk arriving after assembly (a client
    /// retry that never saw the final ack) is rejected and its file
    /// deleted so nothing leaks into the staging root.
    pub async fn record_chunk(
        &self,
        upload_id: &str,
        seq: u64,
        path: PathBuf,
        is_last: bool,
    ) -> StorageResult<()> {
        let session = self
            .get(upload_id)
            .ok_or_else(|| StorageError::SessionNotFound(upload_id.to_string()))?;
        let mut session = session.lock().await;

        if session.assembled {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(StorageError::ChunkAfterAssembly { seq });
        }
        if let Some(total) = session.total_chunks {
            if seq >= total {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(StorageError::ChunkAfterFinal {
                    seq,
                    total_chunks: total,
                });
            }
        }

        session.chunks.insert(seq, path);
        if is_last {
            session.last_chunk_seen = true;
            session.total_chunks = Some(seq + 1);
        }
        Ok(())
    }

    /// Record a chunk-write failure. The session survives for status
    /// reporting; only the failed chunk is lost. An assembled session
    /// is past failing and keeps reporting its video id.
    pub async fn set_error(&self, upload_id: &str, message: impl Into<String>) {
        if let Some(session) = self.get(upload_id) {
            let mut session = session.lock().await;
            if session.assembled {
                return;
            }
            let message = message.into();
            warn!("Upload {} error: {}", upload_id, message);
            session.error = Some(message);
        }
    }

    /// Assemble a complete session into a staged source video and
    /// return the assigned video id.
    ///
    /// Fails without assembling when the session is incomplete; an
    /// assembly failure is terminal for the upload and is recorded on
    /// the session.
    pub async fn finish(&self, upload_id: &str, store: &MediaStore) -> StorageResult<VideoId> {
        let session = self
            .get(upload_id)
            .ok_or_else(|| StorageError::SessionNotFound(upload_id.to_string()))?;
        let mut session = session.lock().await;

        if session.assembled {
            // Already done; report the id assigned the first time.
            if let Some(id) = &session.video_id {
                return Ok(id.clone());
            }
        }
        if !session.is_complete() {
            return Err(StorageError::IncompleteUpload(upload_id.to_string()));
        }

        let video_id = VideoId::new();
        let total = session.total_chunks.expect("complete session has a total");
        let result = store
            .assemble(
                video_id.as_str(),
                session.file_extension(),
                &session.chunks,
                total,
            )
            .await;

        match result {
            Ok(path) => {
                session.assembled = true;
                session.video_id = Some(video_id.clone());
                session.chunks.clear();
                info!(
                    "Assembled upload {} into {} (video id {})",
                    upload_id,
                    path.display(),
                    video_id
                );
                Ok(video_id)
            }
            Err(e) => {
                session.error = Some(format!("Failed to assemble file: {e}"));
                Err(e)
            }
        }
    }

    /// Current status of a session.
    pub async fn status(&self, upload_id: &str) -> SessionStatus {
        let Some(session) = self.get(upload_id) else {
            return SessionStatus::Unknown;
        };
        let session = session.lock().await;
        if let Some(error) = &session.error {
            SessionStatus::Failed(error.clone())
        } else if session.assembled {
            let id = session.video_id.clone().expect("assembled session has an id");
            SessionStatus::Completed(id)
        } else {
            SessionStatus::InProgress(session.percent_complete())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store(root: &TempDir) -> MediaStore {
        MediaStore::new(root.path().join("staging"), root.path().join("output"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_out_of_order_upload_assembles_in_order() {
        let root = TempDir::new().unwrap();
        let store = store(&root).await;
        let table = SessionTable::new();

        let id = table.open(None, "movie.mp4", "video/mp4");
        let uid = id.to_string();

        for (seq, bytes, last) in [(1u64, b"BB".as_slice(), false), (0, b"A", false), (2, b"CCC", true)] {
            let path = store.put_chunk(&uid, seq, bytes).await.unwrap();
            table.record_chunk(&uid, seq, path, last).await.unwrap();
        }

        let video_id = table.finish(&uid, &store).await.unwrap();
        let assembled = store.locate_video(video_id.as_str()).await.unwrap().unwrap();
        assert_eq!(assembled.extension().unwrap(), "mp4");
        assert_eq!(tokio::fs::read(&assembled).await.unwrap(), b"ABBCCC");

        match table.status(&uid).await {
            SessionStatus::Completed(v) => assert_eq!(v, video_id),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_incomplete_session_does_not_assemble() {
        let root = TempDir::new().unwrap();
        let store = store(&root).await;
        let table = SessionTable::new();

        let uid = table.open(None, "movie.mp4", "video/mp4").to_string();
        let path = store.put_chunk(&uid, 0, b"A").await.unwrap();
        table.record_chunk(&uid, 0, path, false).await.unwrap();

        let err = table.finish(&uid, &store).await.unwrap_err();
        assert!(matches!(err, StorageError::IncompleteUpload(_)));
        // Still reported as in progress, not failed.
        assert!(matches!(
            table.status(&uid).await,
            SessionStatus::InProgress(_)
        ));
    }

    #[tokio::test]
    async fn test_chunk_after_final_is_protocol_error() {
        let root = TempDir::new().unwrap();
        let store = store(&root).await;
        let table = SessionTable::new();

        let uid = table.open(Some("fixed-id".into()), "a.bin", "application/octet-stream").to_string();
        assert_eq!(uid, "fixed-id");

        let p0 = store.put_chunk(&uid, 0, b"x").await.unwrap();
        table.record_chunk(&uid, 0, p0, true).await.unwrap();

        let p9 = store.put_chunk(&uid, 9, b"y").await.unwrap();
        let err = table.record_chunk(&uid, 9, p9, false).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::ChunkAfterFinal { seq: 9, total_chunks: 1 }
        ));
    }

    #[tokio::test]
    async fn test_chunk_retry_after_assembly_is_rejected() {
        let root = TempDir::new().unwrap();
        let store = store(&root).await;
        let table = SessionTable::new();

        let uid = table.open(None, "movie.mp4", "video/mp4").to_string();
        let p0 = store.put_chunk(&uid, 0, b"A").await.unwrap();
        table.record_chunk(&uid, 0, p0, false).await.unwrap();
        let p1 = store.put_chunk(&uid, 1, b"B").await.unwrap();
        table.record_chunk(&uid, 1, p1, true).await.unwrap();

        let video_id = table.finish(&uid, &store).await.unwrap();

        // A client that never saw the final ack retries an early chunk.
        let retry = store.put_chunk(&uid, 0, b"A").await.unwrap();
        let err = table
            .record_chunk(&uid, 0, retry.clone(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ChunkAfterAssembly { seq: 0 }));
        // The retried chunk file does not leak into the staging root.
        assert!(!retry.exists());

        // Rejection reporting never un-completes the session.
        table.set_error(&uid, "late chunk").await;
        match table.status(&uid).await {
            SessionStatus::Completed(v) => assert_eq!(v, video_id),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_percent_complete() {
        let root = TempDir::new().unwrap();
        let store = store(&root).await;
        let table = SessionTable::new();

        let uid = table.open(None, "noext", "video/mp4").to_string();
        let p = store.put_chunk(&uid, 3, b"z").await.unwrap();
        table.record_chunk(&uid, 3, p, false).await.unwrap();

        // Total unknown: coarse estimate from the chunk count, not the
        // highest sequence number.
        assert!(matches!(table.status(&uid).await, SessionStatus::InProgress(10)));

        let p = store.put_chunk(&uid, 4, b"z").await.unwrap();
        table.record_chunk(&uid, 4, p, true).await.unwrap();
        // 2 of 5 chunks present.
        assert!(matches!(table.status(&uid).await, SessionStatus::InProgress(40)));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let table = SessionTable::new();
        assert_eq!(table.status("nope").await, SessionStatus::Unknown);
    }
}
