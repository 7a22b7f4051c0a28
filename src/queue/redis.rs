use crate::queue::error::{QueueError, Result};
use crate::queue::types::{Job, ProcessedNotification};
use crate::queue::{JobQueue, JOB_QUEUE, PROCESSED_QUEUE};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Durable Redis-backed queue. Uses `LPUSH`/`BRPOP` so pushers and the blocking
/// consumer never contend on the same end of the list.
pub struct RedisQueue {
    conn: ConnectionManager,
}

impl RedisQueue {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| QueueError::Backend(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(Self { conn })
    }

    async fn push(&self, queue: &str, payload: String) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(queue, payload)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))
    }

    /// Blocking pop with no timeout, retrying on transient connection errors
    /// after a short sleep, matching the original worker's "sleep 1s and
    /// continue" behaviour on pop failure.
    async fn pop(&self, queue: &str) -> Result<String> {
        loop {
            let mut conn = self.conn.clone();
            let result: redis::RedisResult<Option<(String, String)>> =
                conn.brpop(queue, 0.0).await;
            match result {
                Ok(Some((_, payload))) => return Ok(payload),
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, queue, "redis pop failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push_job(&self, job: &Job) -> Result<()> {
        let payload = serde_json::to_string(job)?;
        self.push(JOB_QUEUE, payload).await
    }

    async fn pop_job(&self) -> Result<Job> {
        let payload = self.pop(JOB_QUEUE).await?;
        Ok(serde_json::from_str(&payload)?)
    }

    async fn push_processed(&self, note: &ProcessedNotification) -> Result<()> {
        let payload = serde_json::to_string(note)?;
        self.push(PROCESSED_QUEUE, payload).await
    }

    async fn pop_processed(&self) -> Result<ProcessedNotification> {
        let payload = self.pop(PROCESSED_QUEUE).await?;
        Ok(serde_json::from_str(&payload)?)
    }

    async fn job_queue_depth(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let depth: i64 = conn
            .llen(JOB_QUEUE)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(depth.max(0) as u64)
    }
}
