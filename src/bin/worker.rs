//! Standalone worker process, mirroring the original system's separate
//! `cmd/worker` binary: a broker-consumer deployment with a single worker
//! reading from the durable Redis queue, as opposed to the in-process
//! worker-pool mode run inside `chunk-ingest-server`.

use chunk_ingest::chunk::ChunkStore;
use chunk_ingest::jobstore::JobStore;
use chunk_ingest::metrics;
use chunk_ingest::queue::{JobQueue, RedisQueue};
use chunk_ingest::worker::{LoggingMediaProcessor, WorkerPipeline};
use chunk_ingest::Config;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!("starting standalone chunk ingest worker");

    let chunk_store = Arc::new(ChunkStore::new(
        config.upload.temp_dir.clone(),
        config.upload.uploads_dir.clone(),
    ));
    let queue: Arc<dyn JobQueue> = Arc::new(RedisQueue::connect(&config.redis_url()).await?);
    let job_store = Arc::new(JobStore::new(&config.job_store.path).await?);
    let metrics_addr: std::net::SocketAddr = format!("0.0.0.0:{}", config.metrics.port).parse()?;
    metrics::start_metrics_server(metrics::MetricsConfig {
        listen_addr: metrics_addr,
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))?;

    let pipeline = WorkerPipeline::new(chunk_store, queue, job_store, Arc::new(LoggingMediaProcessor));
    let handles = pipeline.spawn(1);

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
