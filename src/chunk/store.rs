use crate::chunk::error::{ChunkError, Result};
use crate::chunk::types::{normalise, ChunkClass, MergeOutcome};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Durable, idempotent, crash-safe persistence of individual chunks and their
/// promotion into a single merged object.
///
/// One global file mutex guards every mutating filesystem operation, matching
/// the original repository's single `fileMutex`: chunk writes across different
/// sessions are serialized, which is acceptable because a single local disk is
/// the bottleneck anyway.
pub struct ChunkStore {
    temp_dir: PathBuf,
    uploads_dir: PathBuf,
    file_lock: Arc<tokio::sync::Mutex<()>>,
    progress: DashMap<String, u32>,
    active_ops: DashMap<String, AtomicI64>,
}

impl ChunkStore {
    pub fn new(temp_dir: impl Into<PathBuf>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            uploads_dir: uploads_dir.into(),
            file_lock: Arc::new(tokio::sync::Mutex::new(())),
            progress: DashMap::new(),
            active_ops: DashMap::new(),
        }
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.temp_dir.join(session_id)
    }

    fn part_path(&self, session_id: &str, filename: &str, index: u32) -> PathBuf {
        self.session_dir(session_id)
            .join(format!("{filename}.part{index}"))
    }

    fn enter_op(&self, session_id: &str) {
        self.active_ops
            .entry(session_id.to_string())
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(1, Ordering::SeqCst);
    }

    fn exit_op(&self, session_id: &str) {
        if let Some(counter) = self.active_ops.get(session_id) {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn active_op_count(&self, session_id: &str) -> i64 {
        self.active_ops
            .get(session_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Write a chunk to the staging area. Idempotent: if the final part already
    /// exists, returns success without touching it.
    pub async fn save_chunk(
        &self,
        session_id: &str,
        filename: &str,
        index: u32,
        bytes: &[u8],
    ) -> Result<()> {
        self.enter_op(session_id);
        let result = self.save_chunk_inner(session_id, filename, index, bytes).await;
        self.exit_op(session_id);
        result
    }

    async fn save_chunk_inner(
        &self,
        session_id: &str,
        filename: &str,
        index: u32,
        bytes: &[u8],
    ) -> Result<()> {
        let _guard = self.file_lock.lock().await;

        let final_path = self.part_path(session_id, filename, index);
        if fs::metadata(&final_path).await.is_ok() {
            debug!(session_id, filename, index, "chunk already persisted, skipping");
            return Ok(());
        }

        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ChunkError::ChunkNotSave(e.to_string()))?;

        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tmp_path = dir.join(format!("{filename}.part{index}.tmp.{nonce}"));

        let write_result = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ChunkError::ChunkNotSave(e.to_string()));
        }

        if let Err(_rename_err) = fs::rename(&tmp_path, &final_path).await {
            // cross-device fallback: copy, fsync the destination, then remove the tmp file
            let copy_result = async {
                fs::copy(&tmp_path, &final_path).await?;
                let f = fs::File::open(&final_path).await?;
                f.sync_all().await
            }
            .await;
            let _ = fs::remove_file(&tmp_path).await;
            copy_result.map_err(|e| ChunkError::ChunkNotSave(e.to_string()))?;
        }

        Ok(())
    }

    pub async fn chunk_exists(&self, session_id: &str, filename: &str, index: u32) -> bool {
        fs::metadata(self.part_path(session_id, filename, index))
            .await
            .is_ok()
    }

    /// Compute the SHA-256 hex digest of a persisted chunk, for post-save hash
    /// validation by the worker pipeline.
    pub async fn hash_chunk(&self, session_id: &str, filename: &str, index: u32) -> Result<String> {
        let bytes = fs::read(self.part_path(session_id, filename, index))
            .await
            .map_err(|e| ChunkError::CannotStat(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    fn final_path(&self, session_id: &str, filename: &str) -> PathBuf {
        let class = ChunkClass::from_filename(filename);
        self.uploads_dir
            .join(class.dir_name())
            .join("original")
            .join(format!("{session_id}_{filename}"))
    }

    /// Merge every part `1..=total_chunks` into the final object. Fails with
    /// `MissingChunk` (no side effects) if any index is absent before the merge
    /// starts. Uses skip-then-check: a part that fails to copy is logged and
    /// skipped rather than aborting the whole merge, so one diagnostic surfaces
    /// every defective index instead of just the first.
    pub async fn merge_chunks(
        &self,
        session_id: &str,
        filename: &str,
        total_chunks: u32,
    ) -> Result<MergeOutcome> {
        self.enter_op(session_id);
        let result = self
            .merge_chunks_inner(session_id, filename, total_chunks)
            .await;
        self.exit_op(session_id);
        result
    }

    async fn merge_chunks_inner(
        &self,
        session_id: &str,
        filename: &str,
        total_chunks: u32,
    ) -> Result<MergeOutcome> {
        let _guard = self.file_lock.lock().await;

        let mut missing = Vec::new();
        for index in 1..=total_chunks {
            if !self.chunk_exists(session_id, filename, index).await {
                missing.push(index);
            }
        }
        if !missing.is_empty() {
            return Err(ChunkError::MissingChunk { missing });
        }

        let merged = self
            .write_merged_object(session_id, filename, 1..=total_chunks)
            .await?;

        if merged != total_chunks {
            return Err(ChunkError::ChunksNotMerged {
                merged,
                total: total_chunks,
            });
        }

        self.set_merged(session_id, filename, merged);
        self.remove_part_files(session_id, filename, 1..=total_chunks)
            .await;
        self.remove_session_dir_if_empty(session_id).await;

        Ok(MergeOutcome {
            path: self.final_path(session_id, filename),
            merged_count: merged,
        })
    }

    /// Best-effort merge discovering the total from whatever parts are present
    /// on disk. Succeeds if at least one contiguous-from-one part was merged.
    pub async fn retry_merge(&self, session_id: &str, filename: &str) -> Result<MergeOutcome> {
        self.enter_op(session_id);
        let result = self.retry_merge_inner(session_id, filename).await;
        self.exit_op(session_id);
        result
    }

    async fn retry_merge_inner(&self, session_id: &str, filename: &str) -> Result<MergeOutcome> {
        let _guard = self.file_lock.lock().await;

        let dir = self.session_dir(session_id);
        let prefix = format!("{filename}.part");
        let mut indices: Vec<u32> = Vec::new();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(_) => {
                return Err(ChunkError::MissingChunk { missing: vec![1] });
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(rest) = name.strip_prefix(&prefix) {
                    if !rest.contains(".tmp.") {
                        if let Ok(n) = rest.parse::<u32>() {
                            indices.push(n);
                        }
                    }
                }
            }
        }
        indices.sort_unstable();

        let mut contiguous = Vec::new();
        for (expected, n) in (1..).zip(indices.iter()) {
            if *n == expected {
                contiguous.push(*n);
            } else {
                break;
            }
        }

        if contiguous.is_empty() {
            return Err(ChunkError::MissingChunk { missing: vec![1] });
        }

        let merged = self
            .write_merged_object(session_id, filename, contiguous.iter().copied())
            .await?;

        self.set_merged(session_id, filename, merged);
        self.remove_part_files(session_id, filename, contiguous.iter().copied())
            .await;
        self.remove_session_dir_if_empty(session_id).await;
        let _ = fs::remove_dir_all(&dir).await;

        Ok(MergeOutcome {
            path: self.final_path(session_id, filename),
            merged_count: merged,
        })
    }

    async fn write_merged_object(
        &self,
        session_id: &str,
        filename: &str,
        indices: impl IntoIterator<Item = u32>,
    ) -> Result<u32> {
        let final_path = self.final_path(session_id, filename);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ChunkError::Internal(e.to_string()))?;
        }

        if fs::metadata(&final_path).await.is_ok() {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let backup_path =
                PathBuf::from(format!("{}.backup.{}", final_path.display(), ts));
            fs::rename(&final_path, &backup_path)
                .await
                .map_err(ChunkError::Io)?;
        }

        let mut out = fs::File::create(&final_path).await.map_err(ChunkError::Io)?;
        let mut merged = 0u32;
        for index in indices {
            let part_path = self.part_path(session_id, filename, index);
            match fs::read(&part_path).await {
                Ok(bytes) => match out.write_all(&bytes).await {
                    Ok(()) => merged += 1,
                    Err(e) => warn!(session_id, filename, index, error = %e, "failed writing part into merged object"),
                },
                Err(e) => warn!(session_id, filename, index, error = %e, "failed reading part for merge"),
            }
        }
        out.sync_all().await.map_err(ChunkError::Io)?;

        Ok(merged)
    }

    async fn remove_part_files(
        &self,
        session_id: &str,
        filename: &str,
        indices: impl IntoIterator<Item = u32>,
    ) {
        for index in indices {
            let _ = fs::remove_file(self.part_path(session_id, filename, index)).await;
        }
    }

    async fn remove_session_dir_if_empty(&self, session_id: &str) {
        let dir = self.session_dir(session_id);
        if let Ok(mut entries) = fs::read_dir(&dir).await {
            if entries.next_entry().await.ok().flatten().is_none() {
                let _ = fs::remove_dir(&dir).await;
            }
        }
    }

    /// Wait for outstanding mutations to finish, then remove the session's
    /// staging directory. Retries removal up to three times with a linear
    /// backoff, matching the original `CleanupTempFiles` behaviour.
    pub async fn cleanup(&self, session_id: &str) -> Result<()> {
        let deadline = Duration::from_secs(5);
        let poll = Duration::from_millis(100);
        let mut waited = Duration::ZERO;
        while self.active_op_count(session_id) > 0 && waited < deadline {
            tokio::time::sleep(poll).await;
            waited += poll;
        }

        let dir = self.session_dir(session_id);
        let mut last_err = None;
        for attempt in 1..=3u32 {
            match fs::remove_dir_all(&dir).await {
                Ok(()) => {
                    last_err = None;
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    last_err = None;
                    break;
                }
                Err(e) => {
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                }
            }
        }
        if let Some(e) = last_err {
            return Err(ChunkError::CannotRemove(e.to_string()));
        }

        self.clear_progress_for_session(session_id);
        self.active_ops.remove(session_id);
        Ok(())
    }

    fn clear_progress_for_session(&self, session_id: &str) {
        let prefix = normalise(session_id, "");
        self.progress.retain(|key, _| !key.starts_with(&prefix));
    }

    pub fn get_merged(&self, session_id: &str, filename: &str) -> Option<u32> {
        self.progress.get(&normalise(session_id, filename)).map(|v| *v)
    }

    pub fn set_merged(&self, session_id: &str, filename: &str, count: u32) {
        self.progress.insert(normalise(session_id, filename), count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> ChunkStore {
        ChunkStore::new(temp.path().join("temp"), temp.path().join("uploads"))
    }

    #[tokio::test]
    async fn save_then_merge_happy_path() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store.save_chunk("u1", "a.jpg", 2, b"BBBB").await.unwrap();
        store.save_chunk("u1", "a.jpg", 1, b"AAAA").await.unwrap();
        store.save_chunk("u1", "a.jpg", 3, b"CCCC").await.unwrap();

        let outcome = store.merge_chunks("u1", "a.jpg", 3).await.unwrap();
        assert_eq!(outcome.merged_count, 3);
        let bytes = tokio::fs::read(&outcome.path).await.unwrap();
        assert_eq!(bytes, b"AAAABBBBCCCC");
        assert_eq!(store.get_merged("u1", "a.jpg"), Some(3));
    }

    #[tokio::test]
    async fn save_chunk_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.save_chunk("u1", "a.jpg", 1, b"AAAA").await.unwrap();
        store.save_chunk("u1", "a.jpg", 1, b"AAAA").await.unwrap();
        assert!(store.chunk_exists("u1", "a.jpg", 1).await);
    }

    #[tokio::test]
    async fn merge_with_missing_chunk_has_no_side_effects() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.save_chunk("u1", "a.jpg", 1, b"AAAA").await.unwrap();
        store.save_chunk("u1", "a.jpg", 3, b"CCCC").await.unwrap();

        let err = store.merge_chunks("u1", "a.jpg", 3).await.unwrap_err();
        match err {
            ChunkError::MissingChunk { missing } => assert_eq!(missing, vec![2]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!temp.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn merge_backs_up_existing_final_object() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let final_dir = temp.path().join("uploads/media/original");
        tokio::fs::create_dir_all(&final_dir).await.unwrap();
        tokio::fs::write(final_dir.join("u1_a.jpg"), b"OLD").await.unwrap();

        store.save_chunk("u1", "a.jpg", 1, b"NEW1").await.unwrap();
        let outcome = store.merge_chunks("u1", "a.jpg", 1).await.unwrap();
        assert_eq!(tokio::fs::read(&outcome.path).await.unwrap(), b"NEW1");

        let mut saw_backup = false;
        let mut entries = tokio::fs::read_dir(&final_dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("u1_a.jpg.backup.") {
                saw_backup = true;
                assert_eq!(tokio::fs::read(entry.path()).await.unwrap(), b"OLD");
            }
        }
        assert!(saw_backup);
    }

    #[tokio::test]
    async fn retry_merge_recovers_best_effort() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.save_chunk("u1", "a.jpg", 1, b"AAAA").await.unwrap();
        store.save_chunk("u1", "a.jpg", 2, b"BBBB").await.unwrap();

        let outcome = store.retry_merge("u1", "a.jpg").await.unwrap();
        assert_eq!(outcome.merged_count, 2);
    }

    #[tokio::test]
    async fn cleanup_removes_temp_and_progress() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        store.save_chunk("u1", "a.jpg", 1, b"AAAA").await.unwrap();
        store.merge_chunks("u1", "a.jpg", 1).await.unwrap();
        store.cleanup("u1").await.unwrap();
        assert!(store.get_merged("u1", "a.jpg").is_none());
    }
}
