use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    SaveChunk,
    Merge,
    RetryMerge,
    Cleanup,
}

impl JobType {
    /// The wire vocabulary used by the failed-jobs ledger, matching the
    /// original `queue/job.go` constants (`JobMerge = "merge_chunks"` etc).
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::SaveChunk => "save_chunk",
            JobType::Merge => "merge_chunks",
            JobType::RetryMerge => "retry_merge",
            JobType::Cleanup => "cleanup",
        }
    }
}

/// A unit of work popped from `job_queue`. Not every field is meaningful for
/// every `JobType` — e.g. `index`/`bytes`/`chunk_hash` only apply to `SaveChunk`,
/// `total_chunks` only to `Merge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub session_id: String,
    pub job_type: JobType,
    pub filename: String,
    pub index: u32,
    pub bytes: Vec<u8>,
    pub chunk_hash: Option<String>,
    pub total_chunks: u32,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl Job {
    pub fn save_chunk(
        session_id: impl Into<String>,
        filename: impl Into<String>,
        index: u32,
        bytes: Vec<u8>,
        chunk_hash: Option<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            job_type: JobType::SaveChunk,
            filename: filename.into(),
            index,
            bytes,
            chunk_hash,
            total_chunks: 0,
            retry_count: 0,
            last_error: None,
        }
    }

    pub fn merge(
        session_id: impl Into<String>,
        filename: impl Into<String>,
        total_chunks: u32,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            job_type: JobType::Merge,
            filename: filename.into(),
            index: 0,
            bytes: Vec::new(),
            chunk_hash: None,
            total_chunks,
            retry_count: 0,
            last_error: None,
        }
    }

    pub fn retry_merge(
        session_id: impl Into<String>,
        filename: impl Into<String>,
        retry_count: u32,
        last_error: Option<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            job_type: JobType::RetryMerge,
            filename: filename.into(),
            index: 0,
            bytes: Vec::new(),
            chunk_hash: None,
            total_chunks: 0,
            retry_count,
            last_error,
        }
    }

    pub fn cleanup(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            job_type: JobType::Cleanup,
            filename: String::new(),
            index: 0,
            bytes: Vec::new(),
            chunk_hash: None,
            total_chunks: 0,
            retry_count: 0,
            last_error: None,
        }
    }
}

/// Published to `processed_queue` once a merge succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedNotification {
    pub session_id: String,
    pub filename: String,
    pub merged_path: String,
    pub total_chunks: u32,
}
