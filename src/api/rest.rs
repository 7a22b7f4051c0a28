use crate::api::error::{ApiError, ApiResult};
use crate::api::service::IngestService;
use crate::api::types::{
    CancelResponse, CompleteResponse, RetryResponse, StatusResponse, UploadChunkResponse,
};
use axum::extract::{Multipart, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct RestApi {
    service: Arc<IngestService>,
}

impl RestApi {
    pub fn new(service: Arc<IngestService>) -> Self {
        Self { service }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/api/v1/upload/chunk", post(upload_chunk))
            .route("/api/v1/upload/complete", post(complete_upload))
            .route("/api/v1/upload/cancel", post(cancel_upload))
            .route("/api/v1/upload/status", get(get_status))
            .route("/api/v1/upload/retry", post(retry_merge))
            .with_state(self.service)
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

struct ChunkForm {
    upload_id: String,
    chunk_index: Option<u32>,
    filename: String,
    chunk_hash: Option<String>,
    bytes: Vec<u8>,
}

async fn parse_chunk_form(mut multipart: Multipart) -> ApiResult<ChunkForm> {
    let mut upload_id = String::new();
    let mut chunk_index = None;
    let mut filename = String::new();
    let mut chunk_hash = None;
    let mut bytes = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::TmpFileError(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "upload_id" => {
                upload_id = field.text().await.map_err(|e| ApiError::TmpFileError(e.to_string()))?
            }
            "chunk_index" => {
                let text = field.text().await.map_err(|e| ApiError::TmpFileError(e.to_string()))?;
                chunk_index = text.parse::<u32>().ok();
            }
            "filename" => {
                filename = field.text().await.map_err(|e| ApiError::TmpFileError(e.to_string()))?
            }
            "chunk_hash" => {
                let text = field.text().await.map_err(|e| ApiError::TmpFileError(e.to_string()))?;
                if !text.is_empty() {
                    chunk_hash = Some(text);
                }
            }
            "file" => {
                let data = field.bytes().await.map_err(|_| ApiError::ChunkNotOpen)?;
                bytes = data.to_vec();
            }
            _ => {}
        }
    }

    Ok(ChunkForm {
        upload_id,
        chunk_index,
        filename,
        chunk_hash,
        bytes,
    })
}

async fn upload_chunk(
    State(service): State<Arc<IngestService>>,
    multipart: Multipart,
) -> ApiResult<Json<UploadChunkResponse>> {
    let form = parse_chunk_form(multipart).await?;
    let chunk_index = form
        .chunk_index
        .ok_or_else(|| ApiError::InvalidChunk("chunk_index must be a positive integer".to_string()))?;

    let enqueued = service
        .upload_chunk(&form.upload_id, chunk_index, &form.filename, form.chunk_hash, form.bytes)
        .await?;

    Ok(Json(UploadChunkResponse {
        status: if enqueued { "queued".to_string() } else { "ok".to_string() },
        upload_id: form.upload_id,
        chunk_index,
        filename: form.filename,
        message: None,
    }))
}

async fn complete_upload(
    State(service): State<Arc<IngestService>>,
    mut multipart: Multipart,
) -> ApiResult<Json<CompleteResponse>> {
    let mut upload_id = String::new();
    let mut filename = String::new();
    let mut total_chunks = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::TmpFileError(e.to_string()))?
    {
        match field.name().unwrap_or("") {
            "upload_id" => upload_id = field.text().await.map_err(|e| ApiError::TmpFileError(e.to_string()))?,
            "filename" => filename = field.text().await.map_err(|e| ApiError::TmpFileError(e.to_string()))?,
            "total_chunks" => {
                let text = field.text().await.map_err(|e| ApiError::TmpFileError(e.to_string()))?;
                total_chunks = text.parse::<u32>().ok();
            }
            _ => {}
        }
    }

    let total_chunks =
        total_chunks.ok_or_else(|| ApiError::InvalidChunk("total_chunks must be a positive integer".to_string()))?;

    service.complete_upload(&upload_id, &filename, total_chunks).await?;

    Ok(Json(CompleteResponse {
        status: "queued".to_string(),
        message: "merge queued".to_string(),
        filename,
    }))
}

async fn cancel_upload(
    State(service): State<Arc<IngestService>>,
    mut multipart: Multipart,
) -> ApiResult<Json<CancelResponse>> {
    let mut upload_id = String::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::TmpFileError(e.to_string()))?
    {
        if field.name() == Some("upload_id") {
            upload_id = field.text().await.map_err(|e| ApiError::TmpFileError(e.to_string()))?;
        }
    }

    service.cancel_upload(&upload_id).await?;

    Ok(Json(CancelResponse {
        status: "queued".to_string(),
        message: "cleanup queued".to_string(),
    }))
}

async fn get_status(
    State(service): State<Arc<IngestService>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<StatusResponse>> {
    let upload_id = params
        .get("upload_id")
        .ok_or_else(|| ApiError::InvalidChunk("upload_id is required".to_string()))?
        .clone();
    let filename = params
        .get("filename")
        .ok_or_else(|| ApiError::InvalidChunk("filename is required".to_string()))?
        .clone();

    let (uploaded_chunks, status) = service.get_status(&upload_id, &filename);

    Ok(Json(StatusResponse {
        upload_id,
        filename,
        uploaded_chunks,
        status: status.to_string(),
    }))
}

async fn retry_merge(
    State(service): State<Arc<IngestService>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<RetryResponse>> {
    let upload_id = params
        .get("upload_id")
        .ok_or_else(|| ApiError::InvalidChunk("upload_id is required".to_string()))?;
    let filename = params
        .get("filename")
        .ok_or_else(|| ApiError::InvalidChunk("filename is required".to_string()))?;

    let merged_file = service.retry(upload_id, filename).await?;
    Ok(Json(RetryResponse { merged_file }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkStore;
    use crate::queue::{JobQueue, MemoryQueue};
    use http_body_util::BodyExt;
    use tower::Service;

    async fn test_router() -> (Router, tempfile::TempDir) {
        let temp = tempfile::TempDir::new().unwrap();
        let chunk_store = Arc::new(ChunkStore::new(
            temp.path().join("temp"),
            temp.path().join("uploads"),
        ));
        let queue: Arc<dyn JobQueue> = Arc::new(MemoryQueue::new(16));
        let service = Arc::new(IngestService::new(chunk_store, queue));
        (RestApi::new(service).router(), temp)
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let (mut app, _temp) = test_router().await;
        let request = axum::http::Request::builder()
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn status_for_unknown_upload_is_failed() {
        let (mut app, _temp) = test_router().await;
        let request = axum::http::Request::builder()
            .uri("/api/v1/upload/status?upload_id=nope&filename=a.jpg")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.status, "failed");
    }
}
