use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedJobRecord {
    pub id: i64,
    pub session_id: String,
    pub filename: String,
    pub job_type: String,
    pub last_error: String,
    pub payload: Vec<u8>,
    pub created_at: i64,
    pub status: String,
}
