use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("chunk not found")]
    NotFound,

    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("could not open chunk source")]
    ChunkNotOpen,

    #[error("could not persist chunk: {0}")]
    ChunkNotSave(String),

    #[error("could not read incoming chunk body: {0}")]
    TmpFileError(String),

    #[error("missing chunk(s): {missing:?}")]
    MissingChunk { missing: Vec<u32> },

    #[error("merge incomplete: merged {merged} of {total}")]
    ChunksNotMerged { merged: u32, total: u32 },

    #[error("could not stat path: {0}")]
    CannotStat(String),

    #[error("could not remove path: {0}")]
    CannotRemove(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ChunkError {
    /// Whether the worker pipeline should retry an operation that failed this way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChunkError::MissingChunk { .. }
                | ChunkError::CannotStat(_)
                | ChunkError::CannotRemove(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChunkError>;
