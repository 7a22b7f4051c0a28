use crate::queue::error::{QueueError, Result};
use crate::queue::types::{Job, ProcessedNotification};
use crate::queue::JobQueue;
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};

/// In-process bounded-channel queue. No durability across restarts; suited to
/// the single-binary "worker-pool mode" and to tests.
pub struct MemoryQueue {
    job_tx: Sender<Job>,
    job_rx: Mutex<Receiver<Job>>,
    processed_tx: Sender<ProcessedNotification>,
    processed_rx: Mutex<Receiver<ProcessedNotification>>,
    job_depth: AtomicI64,
}

impl MemoryQueue {
    pub fn new(capacity: usize) -> Self {
        let (job_tx, job_rx) = mpsc::channel(capacity);
        let (processed_tx, processed_rx) = mpsc::channel(capacity);
        Self {
            job_tx,
            job_rx: Mutex::new(job_rx),
            processed_tx,
            processed_rx: Mutex::new(processed_rx),
            job_depth: AtomicI64::new(0),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn push_job(&self, job: &Job) -> Result<()> {
        self.job_tx
            .send(job.clone())
            .await
            .map_err(|_| QueueError::Closed)?;
        self.job_depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pop_job(&self) -> Result<Job> {
        let job = self
            .job_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(QueueError::Closed)?;
        self.job_depth.fetch_sub(1, Ordering::SeqCst);
        Ok(job)
    }

    async fn push_processed(&self, note: &ProcessedNotification) -> Result<()> {
        self.processed_tx
            .send(note.clone())
            .await
            .map_err(|_| QueueError::Closed)
    }

    async fn pop_processed(&self) -> Result<ProcessedNotification> {
        self.processed_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(QueueError::Closed)
    }

    async fn job_queue_depth(&self) -> Result<u64> {
        Ok(self.job_depth.load(Ordering::SeqCst).max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_job() {
        let queue = MemoryQueue::new(8);
        let job = Job::save_chunk("u1", "a.jpg", 1, vec![1, 2, 3], None);
        queue.push_job(&job).await.unwrap();
        let popped = queue.pop_job().await.unwrap();
        assert_eq!(popped.session_id, "u1");
        assert_eq!(popped.bytes, vec![1, 2, 3]);
    }
}
