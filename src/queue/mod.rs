pub mod error;
pub mod memory;
pub mod redis;
pub mod types;

pub use error::{QueueError, Result};
pub use memory::MemoryQueue;
pub use redis::RedisQueue;
pub use types::{Job, JobType, ProcessedNotification};

use async_trait::async_trait;

pub const JOB_QUEUE: &str = "job_queue";
pub const PROCESSED_QUEUE: &str = "processed_queue";

/// A durable, blocking FIFO. Two backends satisfy this trait: an in-process
/// channel for single-binary/worker-pool deployments, and a Redis-backed queue
/// for the broker-consumer deployment. Both give at-least-once delivery.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push_job(&self, job: &Job) -> Result<()>;
    async fn pop_job(&self) -> Result<Job>;
    async fn push_processed(&self, note: &ProcessedNotification) -> Result<()>;
    async fn pop_processed(&self) -> Result<ProcessedNotification>;
    /// Approximate number of jobs waiting in `job_queue`, for the queue-depth gauge.
    async fn job_queue_depth(&self) -> Result<u64>;
}
