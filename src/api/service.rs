use crate::api::error::{ApiError, ApiResult};
use crate::chunk::ChunkStore;
use crate::queue::{Job, JobQueue};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The validating, enqueuing front door. Stateless beyond a single mutex that
/// serialises `complete`/`cancel` against each other, mirroring the original
/// `uploadService`'s shared lock.
pub struct IngestService {
    chunk_store: Arc<ChunkStore>,
    queue: Arc<dyn JobQueue>,
    complete_cancel_lock: Mutex<()>,
}

impl IngestService {
    pub fn new(chunk_store: Arc<ChunkStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            chunk_store,
            queue,
            complete_cancel_lock: Mutex::new(()),
        }
    }

    /// Sanitise a client-supplied filename to its base name, refusing path
    /// traversal components the same way `filepath.Base` does.
    fn sanitize_filename(filename: &str) -> String {
        Path::new(filename)
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.to_string())
    }

    pub async fn upload_chunk(
        &self,
        session_id: &str,
        index: u32,
        filename: &str,
        chunk_hash: Option<String>,
        bytes: Vec<u8>,
    ) -> ApiResult<bool> {
        if index == 0 {
            return Err(ApiError::InvalidChunk("chunk_index must be >= 1".to_string()));
        }
        if session_id.is_empty() {
            return Err(ApiError::InvalidChunk("upload_id is required".to_string()));
        }
        if filename.is_empty() {
            return Err(ApiError::InvalidChunk("filename is required".to_string()));
        }

        let filename = Self::sanitize_filename(filename);

        if self.chunk_store.chunk_exists(session_id, &filename, index).await {
            return Ok(false);
        }

        let job = Job::save_chunk(session_id, filename, index, bytes, chunk_hash);
        self.queue.push_job(&job).await?;
        Ok(true)
    }

    pub async fn complete_upload(
        &self,
        session_id: &str,
        filename: &str,
        total_chunks: u32,
    ) -> ApiResult<()> {
        if total_chunks == 0 {
            return Err(ApiError::InvalidChunk("total_chunks must be > 0".to_string()));
        }

        let _guard = self.complete_cancel_lock.lock().await;
        let job = Job::merge(session_id, filename, total_chunks);
        self.queue.push_job(&job).await?;
        Ok(())
    }

    pub async fn cancel_upload(&self, session_id: &str) -> ApiResult<()> {
        let _guard = self.complete_cancel_lock.lock().await;
        let job = Job::cleanup(session_id);
        self.queue.push_job(&job).await?;
        Ok(())
    }

    /// Reports `completed` when the progress counter holds a positive merged
    /// count for this key, else `failed` -- including for uploads still in
    /// flight. See the design notes for why this two-state model was kept.
    pub fn get_status(&self, session_id: &str, filename: &str) -> (u32, &'static str) {
        match self.chunk_store.get_merged(session_id, filename) {
            Some(count) if count > 0 => (count, "completed"),
            _ => (0, "failed"),
        }
    }

    pub async fn retry(&self, session_id: &str, filename: &str) -> ApiResult<String> {
        let outcome = self.chunk_store.retry_merge(session_id, filename).await?;
        Ok(outcome.path.display().to_string())
    }
}
