use chunk_ingest::api::{create_api_server, IngestService};
use chunk_ingest::chunk::ChunkStore;
use chunk_ingest::jobstore::JobStore;
use chunk_ingest::metrics;
use chunk_ingest::queue::{JobQueue, MemoryQueue, RedisQueue};
use chunk_ingest::worker::WorkerPipeline;
use chunk_ingest::Config;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(host = %config.server.host, port = config.server.port, "starting chunk ingest server");

    let chunk_store = Arc::new(ChunkStore::new(
        config.upload.temp_dir.clone(),
        config.upload.uploads_dir.clone(),
    ));

    let queue: Arc<dyn JobQueue> = match RedisQueue::connect(&config.redis_url()).await {
        Ok(redis_queue) => {
            tracing::info!("connected to redis job queue");
            Arc::new(redis_queue)
        }
        Err(e) => {
            tracing::warn!(error = %e, "redis unavailable, falling back to in-process queue-less mode");
            Arc::new(MemoryQueue::default())
        }
    };

    let job_store = Arc::new(JobStore::new(&config.job_store.path).await?);
    let metrics_addr: std::net::SocketAddr = format!("0.0.0.0:{}", config.metrics.port).parse()?;
    metrics::start_metrics_server(metrics::MetricsConfig {
        listen_addr: metrics_addr,
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))?;

    let pipeline = WorkerPipeline::new(
        chunk_store.clone(),
        queue.clone(),
        job_store,
        Arc::new(chunk_ingest::worker::LoggingMediaProcessor),
    );
    let _workers = pipeline.spawn(config.upload.worker_pool_size);

    let service = Arc::new(IngestService::new(chunk_store, queue));
    let app = create_api_server(service);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
