use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("queue closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, QueueError>;
