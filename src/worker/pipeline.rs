use crate::chunk::{ChunkError, ChunkStore};
use crate::jobstore::JobStore;
use crate::queue::{Job, JobQueue, JobType, ProcessedNotification};
use crate::worker::error::{Result, WorkerError};
use crate::worker::processor::MediaProcessor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const MAX_MERGE_ATTEMPTS: u32 = 5;
const MAX_RETRY_JOBS: u32 = 3;
const MERGE_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(20);

/// Pops jobs from the queue and dispatches them by type. Jobs for the same
/// session are not pinned to a single worker; correctness rests on the chunk
/// store's own locking plus the API layer's complete/cancel mutual exclusion.
#[derive(Clone)]
pub struct WorkerPipeline {
    chunk_store: Arc<ChunkStore>,
    queue: Arc<dyn JobQueue>,
    job_store: Arc<JobStore>,
    processor: Arc<dyn MediaProcessor>,
}

impl WorkerPipeline {
    pub fn new(
        chunk_store: Arc<ChunkStore>,
        queue: Arc<dyn JobQueue>,
        job_store: Arc<JobStore>,
        processor: Arc<dyn MediaProcessor>,
    ) -> Self {
        Self {
            chunk_store,
            queue,
            job_store,
            processor,
        }
    }

    /// Spawn `worker_count` job-consuming tasks, one processed-notification
    /// consumer, and a queue-depth reporter. Returns their join handles so the
    /// caller can await shutdown.
    pub fn spawn(&self, worker_count: usize) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::with_capacity(worker_count + 2);
        for id in 0..worker_count {
            let pipeline = self.clone();
            handles.push(tokio::spawn(async move { pipeline.run_worker(id).await }));
        }
        let pipeline = self.clone();
        handles.push(tokio::spawn(async move { pipeline.run_notifications().await }));
        let pipeline = self.clone();
        handles.push(tokio::spawn(async move { pipeline.run_depth_reporter().await }));
        handles
    }

    async fn run_depth_reporter(&self) {
        loop {
            match self.queue.job_queue_depth().await {
                Ok(depth) => crate::metrics::set_queue_depth(depth as f64),
                Err(e) => warn!(error = %e, "failed to read job queue depth"),
            }
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    }

    async fn run_worker(&self, worker_id: usize) {
        loop {
            match self.queue.pop_job().await {
                Ok(job) => self.dispatch(job).await,
                Err(e) => {
                    warn!(worker_id, error = %e, "job queue pop failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn run_notifications(&self) {
        loop {
            match self.queue.pop_processed().await {
                Ok(note) => self.handle_processed(note).await,
                Err(e) => {
                    warn!(error = %e, "processed queue pop failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn handle_processed(&self, note: ProcessedNotification) {
        self.chunk_store
            .set_merged(&note.session_id, &note.filename, note.total_chunks);
        self.processor
            .handle_merge_success(
                &note.session_id,
                &note.filename,
                &note.merged_path,
                note.total_chunks,
            )
            .await;
    }

    pub async fn dispatch(&self, job: Job) {
        let session_id = job.session_id.clone();
        let result = match job.job_type {
            JobType::SaveChunk => self.process_save_chunk(job).await,
            JobType::Merge => self.process_merge(job).await,
            JobType::RetryMerge => self.process_retry_merge(job).await,
            JobType::Cleanup => self.process_cleanup(job).await,
        };
        if let Err(e) = result {
            error!(session_id, error = %e, "job dispatch failed");
        }
    }

    async fn process_save_chunk(&self, job: Job) -> Result<()> {
        let Job {
            session_id,
            filename,
            index,
            bytes,
            chunk_hash,
            ..
        } = job;

        if self.chunk_store.chunk_exists(&session_id, &filename, index).await {
            info!(session_id, filename, index, "chunk already present, dropping job");
            return Ok(());
        }

        if let Err(e) = self.chunk_store.save_chunk(&session_id, &filename, index, &bytes).await {
            error!(session_id, filename, index, error = %e, "failed to persist chunk, abandoning session");
            let _ = self.chunk_store.cleanup(&session_id).await;
            return Err(e.into());
        }
        crate::metrics::record_chunk_saved();

        if let Some(expected) = chunk_hash {
            match self.chunk_store.hash_chunk(&session_id, &filename, index).await {
                Ok(actual) if actual.eq_ignore_ascii_case(&expected) => {}
                Ok(actual) => {
                    error!(session_id, filename, index, expected, actual, "chunk hash mismatch, abandoning session");
                    crate::metrics::record_chunk_hash_mismatch();
                    let _ = self.chunk_store.cleanup(&session_id).await;
                    return Err(WorkerError::HashMismatch { expected, actual });
                }
                Err(e) => {
                    error!(session_id, filename, index, error = %e, "could not verify chunk hash, abandoning session");
                    let _ = self.chunk_store.cleanup(&session_id).await;
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    async fn process_merge(&self, mut job: Job) -> Result<()> {
        let mut last_error: Option<ChunkError> = None;

        for attempt in 0..MAX_MERGE_ATTEMPTS {
            let timer = crate::metrics::MergeTimer::start();
            let attempt_result = tokio::time::timeout(
                MERGE_ATTEMPT_TIMEOUT,
                self.chunk_store
                    .merge_chunks(&job.session_id, &job.filename, job.total_chunks),
            )
            .await;
            timer.stop();

            match attempt_result {
                Ok(Ok(outcome)) => {
                    crate::metrics::record_merge_succeeded();
                    self.publish_success(&job.session_id, &job.filename, &outcome.path.display().to_string(), outcome.merged_count)
                        .await;
                    return Ok(());
                }
                Ok(Err(e)) if e.is_retryable() => {
                    warn!(session_id = %job.session_id, filename = %job.filename, attempt, error = %e, "merge failed with a retryable error, backing off");
                    last_error = Some(e);
                    if attempt + 1 < MAX_MERGE_ATTEMPTS {
                        crate::metrics::record_merge_retry();
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
                Ok(Err(e)) => {
                    last_error = Some(e);
                    break;
                }
                Err(_timeout) => {
                    last_error = Some(ChunkError::Internal("merge attempt timed out".to_string()));
                    break;
                }
            }
        }

        let error_message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "merge failed".to_string());

        crate::metrics::record_merge_failed();
        if let Err(e) = self.job_store.record_failure(&job, &error_message).await {
            error!(session_id = %job.session_id, error = %e, "failed to persist failed-job record");
        }
        crate::metrics::record_job_failed_permanently();

        if job.retry_count < MAX_RETRY_JOBS {
            job.retry_count += 1;
            let retry_job = Job::retry_merge(
                job.session_id.clone(),
                job.filename.clone(),
                job.retry_count,
                Some(error_message.clone()),
            );
            self.queue.push_job(&retry_job).await?;
        }

        Err(WorkerError::Chunk(ChunkError::Internal(error_message)))
    }

    /// Retries `retryMerge` with the same bounded backoff schedule as `Merge`.
    /// On exhaustion, chains into another `RetryMerge` job (incrementing
    /// `retry_count`) up to `MAX_RETRY_JOBS`, giving a ceiling of
    /// `MAX_MERGE_ATTEMPTS * (MAX_RETRY_JOBS + 1)` merge attempts per session.
    async fn process_retry_merge(&self, mut job: Job) -> Result<()> {
        let mut last_error: Option<ChunkError> = None;

        for attempt in 0..MAX_MERGE_ATTEMPTS {
            let timer = crate::metrics::MergeTimer::start();
            let attempt_result = tokio::time::timeout(
                MERGE_ATTEMPT_TIMEOUT,
                self.chunk_store.retry_merge(&job.session_id, &job.filename),
            )
            .await;
            timer.stop();

            match attempt_result {
                Ok(Ok(outcome)) => {
                    crate::metrics::record_merge_succeeded();
                    self.publish_success(
                        &job.session_id,
                        &job.filename,
                        &outcome.path.display().to_string(),
                        outcome.merged_count,
                    )
                    .await;
                    return Ok(());
                }
                Ok(Err(e)) if e.is_retryable() => {
                    warn!(session_id = %job.session_id, filename = %job.filename, attempt, error = %e, "retry-merge failed with a retryable error, backing off");
                    last_error = Some(e);
                    if attempt + 1 < MAX_MERGE_ATTEMPTS {
                        crate::metrics::record_merge_retry();
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
                Ok(Err(e)) => {
                    last_error = Some(e);
                    break;
                }
                Err(_timeout) => {
                    last_error = Some(ChunkError::Internal("retry-merge attempt timed out".to_string()));
                    break;
                }
            }
        }

        let error_message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "retry-merge failed".to_string());
        error!(session_id = %job.session_id, filename = %job.filename, error = %error_message, "retry-merge exhausted");
        crate::metrics::record_merge_failed();

        if job.retry_count < MAX_RETRY_JOBS {
            job.retry_count += 1;
            let next = Job::retry_merge(
                job.session_id.clone(),
                job.filename.clone(),
                job.retry_count,
                Some(error_message.clone()),
            );
            self.queue.push_job(&next).await?;
        }

        Err(WorkerError::Chunk(ChunkError::Internal(error_message)))
    }

    async fn process_cleanup(&self, job: Job) -> Result<()> {
        self.chunk_store.cleanup(&job.session_id).await?;
        Ok(())
    }

    async fn publish_success(&self, session_id: &str, filename: &str, merged_path: &str, total_chunks: u32) {
        let note = ProcessedNotification {
            session_id: session_id.to_string(),
            filename: filename.to_string(),
            merged_path: merged_path.to_string(),
            total_chunks,
        };
        if let Err(e) = self.queue.push_processed(&note).await {
            error!(session_id, filename, error = %e, "failed to publish processed notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use crate::worker::processor::LoggingMediaProcessor;
    use tempfile::TempDir;

    async fn pipeline(temp: &TempDir) -> (WorkerPipeline, Arc<ChunkStore>, Arc<dyn JobQueue>) {
        let chunk_store = Arc::new(ChunkStore::new(
            temp.path().join("temp"),
            temp.path().join("uploads"),
        ));
        let queue: Arc<dyn JobQueue> = Arc::new(MemoryQueue::new(16));
        let job_store = Arc::new(crate::jobstore::JobStore::new_in_memory().await.unwrap());
        let processor = Arc::new(LoggingMediaProcessor);
        (
            WorkerPipeline::new(chunk_store.clone(), queue.clone(), job_store, processor),
            chunk_store,
            queue,
        )
    }

    #[tokio::test]
    async fn save_chunk_job_persists_chunk() {
        let temp = TempDir::new().unwrap();
        let (pipeline, chunk_store, _queue) = pipeline(&temp).await;
        let job = Job::save_chunk("u1", "a.jpg", 1, b"hello".to_vec(), None);
        pipeline.dispatch(job).await;
        assert!(chunk_store.chunk_exists("u1", "a.jpg", 1).await);
    }

    #[tokio::test]
    async fn save_chunk_with_bad_hash_aborts_session() {
        let temp = TempDir::new().unwrap();
        let (pipeline, chunk_store, _queue) = pipeline(&temp).await;
        let job = Job::save_chunk("u1", "a.jpg", 1, b"hello".to_vec(), Some("deadbeef".to_string()));
        pipeline.dispatch(job).await;
        assert!(!chunk_store.chunk_exists("u1", "a.jpg", 1).await);
    }

    #[tokio::test]
    async fn merge_job_publishes_notification_on_success() {
        let temp = TempDir::new().unwrap();
        let (pipeline, chunk_store, queue) = pipeline(&temp).await;
        chunk_store.save_chunk("u1", "a.jpg", 1, b"AAAA").await.unwrap();
        let job = Job::merge("u1", "a.jpg", 1);
        pipeline.dispatch(job).await;
        let note = queue.pop_processed().await.unwrap();
        assert_eq!(note.total_chunks, 1);
    }
}
