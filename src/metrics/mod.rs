//! Metrics and observability module.
//!
//! Prometheus-compatible counters and gauges for the chunk ingest engine:
//! chunk saves, merge outcomes and retries, and job-queue depth.

pub mod exporter;
pub mod recorder;

pub use exporter::{start_metrics_server, MetricsConfig};
pub use recorder::{
    init_metrics, record_chunk_hash_mismatch, record_chunk_saved, record_job_failed_permanently,
    record_merge_failed, record_merge_retry, record_merge_succeeded, set_queue_depth, MergeTimer,
};
