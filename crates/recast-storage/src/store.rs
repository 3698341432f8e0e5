//! Staging and output directory layout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// Filesystem store with two roots: a staging root for chunks and
/// assembled source videos, and an output root with one subdirectory
/// per job.
///
/// Path namespaces never collide: chunk files are `<upload_id>_<seq>`,
/// assembled sources are `<video_id><ext>`, and outputs live under
/// `<output>/<job_id>/`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    staging: PathBuf,
    output: PathBuf,
}

impl MediaStore {
    /// Create the store, creating both roots if absent.
    ///
    /// Called once at startup; failure here is fatal.
    pub async fn new(staging: impl Into<PathBuf>, output: impl Into<PathBuf>) -> StorageResult<Self> {
        let staging = staging.into();
        let output = output.into();
        fs::create_dir_all(&staging).await?;
        fs::create_dir_all(&output).await?;
        info!(
            "Storage initialized: staging={}, output={}",
            staging.display(),
            output.display()
        );
        Ok(Self { staging, output })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    /// Persist one upload chunk to `<staging>/<upload_id>_<seq>`.
    ///
    /// The full contents are written before the path is returned, so a
    /// chunk is never observable half-written by assembly.
    pub async fn put_chunk(&self, upload_id: &str, seq: u64, bytes: &[u8]) -> StorageResult<PathBuf> {
        let path = self.staging.join(format!("{upload_id}_{seq}"));
        fs::write(&path, bytes).await?;
        debug!(
            "Saved chunk {} for upload {}, size: {} bytes",
            seq,
            upload_id,
            bytes.len()
        );
        Ok(path)
    }

    /// Concatenate chunk files in ascending sequence order into
    /// `<staging>/<video_id><ext>`, deleting each chunk as it is
    /// consumed.
    ///
    /// Writes through a temporary file and renames on success, so a
    /// missing chunk never leaves a partial output visible.
    pub async fn assemble(
        &self,
        video_id: &str,
        extension: &str,
        chunks: &BTreeMap<u64, PathBuf>,
        total_chunks: u64,
    ) -> StorageResult<PathBuf> {
        let final_path = self.staging.join(format!("{video_id}{extension}"));
        let tmp_path = self.staging.join(format!(".{video_id}{extension}.part"));

        let result = self.concat_chunks(&tmp_path, chunks, total_chunks).await;
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        fs::rename(&tmp_path, &final_path).await?;
        info!(
            "Assembled {} chunks into {}",
            total_chunks,
            final_path.display()
        );
        Ok(final_path)
    }

    async fn concat_chunks(
        &self,
        tmp_path: &Path,
        chunks: &BTreeMap<u64, PathBuf>,
        total_chunks: u64,
    ) -> StorageResult<()> {
        let mut out = fs::File::create(tmp_path).await?;
        for seq in 0..total_chunks {
            let chunk_path = chunks
                .get(&seq)
                .ok_or(StorageError::MissingChunk { seq })?;
            let mut chunk = fs::File::open(chunk_path).await?;
            tokio::io::copy(&mut chunk, &mut out).await?;
            fs::remove_file(chunk_path).await?;
        }
        out.flush().await?;
        Ok(())
    }

    /// Create `<output>/<job_id>/`.
    pub async fn create_job_output_dir(&self, job_id: &str) -> StorageResult<PathBuf> {
        let dir = self.output.join(job_id);
        fs::create_dir_all(&dir).await?;
        debug!("Created job output directory: {}", dir.display());
        Ok(dir)
    }

    /// Output file path for one (job, format) pair:
    /// `<output>/<job_id>/<video_id>_<format_name>.<container>`.
    pub fn output_path(
        &self,
        job_id: &str,
        video_id: &str,
        format_name: &str,
        container: &str,
    ) -> PathBuf {
        self.output
            .join(job_id)
            .join(format!("{video_id}_{format_name}.{container}"))
    }

    /// Find the staged source file for a video id: the first entry in
    /// the staging root whose name starts with the id.
    ///
    /// More than one match would be a bug elsewhere; the lexicographic
    /// smallest is returned so the choice is at least deterministic.
    pub async fn locate_video(&self, video_id: &str) -> StorageResult<Option<PathBuf>> {
        let mut matches: Vec<PathBuf> = Vec::new();
        let mut entries = fs::read_dir(&self.staging).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(video_id) {
                matches.push(entry.path());
            }
        }
        matches.sort();
        if matches.len() > 1 {
            warn!(
                "Multiple staged files match video id {}: picking {}",
                video_id,
                matches[0].display()
            );
        }
        Ok(matches.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store(root: &TempDir) -> MediaStore {
        MediaStore::new(root.path().join("staging"), root.path().join("output"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_chunk_assembly_in_sequence_order() {
        let root = TempDir::new().unwrap();
        let store = test_store(&root).await;

        // Written out of order on purpose.
        let mut chunks = BTreeMap::new();
        chunks.insert(1, store.put_chunk("up1", 1, b"bbb").await.unwrap());
        chunks.insert(0, store.put_chunk("up1", 0, b"aa").await.unwrap());
        chunks.insert(2, store.put_chunk("up1", 2, b"c").await.unwrap());

        let path = store.assemble("vid1", ".mp4", &chunks, 3).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "vid1.mp4");
        assert_eq!(fs::read(&path).await.unwrap(), b"aabbbc");

        // Chunks were consumed and deleted.
        for p in chunks.values() {
            assert!(!p.exists());
        }
    }

    #[tokio::test]
    async fn test_assembly_fails_on_missing_chunk() {
        let root = TempDir::new().unwrap();
        let store = test_store(&root).await;

        let mut chunks = BTreeMap::new();
        chunks.insert(0, store.put_chunk("up2", 0, b"aa").await.unwrap());
        chunks.insert(2, store.put_chunk("up2", 2, b"c").await.unwrap());

        let err = store.assemble("vid2", ".mp4", &chunks, 3).await.unwrap_err();
        assert!(matches!(err, StorageError::MissingChunk { seq: 1 }));

        // No partial output, neither final nor temporary.
        assert!(!store.staging_dir().join("vid2.mp4").exists());
        assert!(!store.staging_dir().join(".vid2.mp4.part").exists());
    }

    #[tokio::test]
    async fn test_locate_video() {
        let root = TempDir::new().unwrap();
        let store = test_store(&root).await;

        assert!(store.locate_video("vid3").await.unwrap().is_none());

        fs::write(store.staging_dir().join("vid3.mov"), b"x")
            .await
            .unwrap();
        let found = store.locate_video("vid3").await.unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "vid3.mov");
    }

    #[tokio::test]
    async fn test_output_paths() {
        let root = TempDir::new().unwrap();
        let store = test_store(&root).await;

        let dir = store.create_job_output_dir("job1").await.unwrap();
        assert!(dir.is_dir());

        let path = store.output_path("job1", "vid1", "720p", "mp4");
        assert_eq!(path, store.output_dir().join("job1").join("vid1_720p.mp4"));
    }
}
