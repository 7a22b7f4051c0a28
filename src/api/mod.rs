pub mod error;
pub mod rest;
pub mod service;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use rest::RestApi;
pub use service::IngestService;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete ingest API router: the five upload endpoints, a health
/// check, request tracing, and a permissive CORS layer (access control is out
/// of scope; this is plumbing, not a security boundary).
pub fn create_api_server(service: std::sync::Arc<IngestService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    RestApi::new(service)
        .router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkStore;
    use crate::queue::MemoryQueue;
    use std::sync::Arc;

    #[tokio::test]
    async fn api_server_builds() {
        let temp = tempfile::TempDir::new().unwrap();
        let chunk_store = Arc::new(ChunkStore::new(
            temp.path().join("temp"),
            temp.path().join("uploads"),
        ));
        let queue: Arc<dyn crate::queue::JobQueue> = Arc::new(MemoryQueue::new(16));
        let service = Arc::new(IngestService::new(chunk_store, queue));
        let _app = create_api_server(service);
    }
}
