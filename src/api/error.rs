use crate::api::types::ErrorResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("could not open chunk source")]
    ChunkNotOpen,

    #[error("could not read request body: {0}")]
    TmpFileError(String),

    #[error(transparent)]
    Chunk(#[from] crate::chunk::ChunkError),

    #[error(transparent)]
    Queue(#[from] crate::queue::QueueError),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found"),
            ApiError::InvalidChunk(_) => (StatusCode::BAD_REQUEST, self.to_string(), "invalid_chunk"),
            ApiError::ChunkNotOpen => (StatusCode::BAD_REQUEST, self.to_string(), "chunk_not_open"),
            ApiError::TmpFileError(_) => (StatusCode::BAD_REQUEST, self.to_string(), "tmp_file_error"),
            ApiError::Chunk(crate::chunk::ChunkError::MissingChunk { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), "missing_chunk")
            }
            ApiError::Chunk(crate::chunk::ChunkError::ChunksNotMerged { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), "chunks_not_merged")
            }
            ApiError::Chunk(crate::chunk::ChunkError::CannotStat(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), "cannot_stat")
            }
            ApiError::Chunk(crate::chunk::ChunkError::CannotRemove(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), "cannot_remove")
            }
            ApiError::Chunk(crate::chunk::ChunkError::NotFound) => {
                (StatusCode::NOT_FOUND, self.to_string(), "not_found")
            }
            ApiError::Chunk(crate::chunk::ChunkError::ChunkNotSave(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), "chunk_not_save")
            }
            ApiError::Chunk(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), "internal_error"),
            ApiError::Queue(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), "internal_error"),
            ApiError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), "internal_error")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
