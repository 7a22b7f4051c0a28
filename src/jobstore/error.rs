use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobStoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for JobStoreError {
    fn from(err: sqlx::Error) -> Self {
        JobStoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for JobStoreError {
    fn from(err: serde_json::Error) -> Self {
        JobStoreError::Serialization(err.to_string())
    }
}

pub type JobStoreResult<T> = Result<T, JobStoreError>;
