use crate::jobstore::error::JobStoreResult;
use crate::jobstore::types::FailedJobRecord;
use crate::queue::Job;
use sqlx::{Row, SqlitePool};

/// Durable ledger of jobs that exhausted their retries, reproducing the
/// original `failed_jobs` table column-for-column (substituting SQLite for
/// Postgres to match the rest of this crate's storage stack).
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub async fn new(db_path: &str) -> JobStoreResult<Self> {
        let pool = SqlitePool::connect(db_path).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS failed_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                job_type TEXT NOT NULL,
                last_error TEXT NOT NULL,
                payload BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'failed'
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_failed_jobs_session ON failed_jobs(session_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    pub async fn new_in_memory() -> JobStoreResult<Self> {
        Self::new("sqlite::memory:").await
    }

    pub async fn record_failure(&self, job: &Job, last_error: &str) -> JobStoreResult<()> {
        let payload = serde_json::to_vec(job)?;
        sqlx::query(
            r#"
            INSERT INTO failed_jobs (session_id, filename, job_type, last_error, payload, created_at, status)
            VALUES (?, ?, ?, ?, ?, ?, 'failed')
            "#,
        )
        .bind(&job.session_id)
        .bind(&job.filename)
        .bind(job.job_type.as_str())
        .bind(last_error)
        .bind(payload)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_by_session(&self, session_id: &str) -> JobStoreResult<Vec<FailedJobRecord>> {
        let rows = sqlx::query("SELECT * FROM failed_jobs WHERE session_id = ? ORDER BY created_at")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(FailedJobRecord {
                    id: row.try_get("id")?,
                    session_id: row.try_get("session_id")?,
                    filename: row.try_get("filename")?,
                    job_type: row.try_get("job_type")?,
                    last_error: row.try_get("last_error")?,
                    payload: row.try_get("payload")?,
                    created_at: row.try_get("created_at")?,
                    status: row.try_get("status")?,
                })
            })
            .collect()
    }

    pub async fn count(&self) -> JobStoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM failed_jobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("c")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Job;

    #[tokio::test]
    async fn records_and_lists_failures() {
        let store = JobStore::new_in_memory().await.unwrap();
        let job = Job::merge("u1", "a.jpg", 3);
        store.record_failure(&job, "missing chunk").await.unwrap();

        let records = store.list_by_session("u1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].last_error, "missing chunk");
        assert_eq!(records[0].job_type, "merge_chunks");
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
