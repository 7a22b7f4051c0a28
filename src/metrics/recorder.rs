//! Metrics recorder for the chunk ingest engine.
//!
//! Records chunk, merge and queue health metrics for Prometheus scraping.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions. Safe to call more than once; only the first
/// call has effect.
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!("ingest_chunks_saved_total", "Total chunks persisted to the chunk store");
    describe_counter!(
        "ingest_chunk_hash_mismatches_total",
        "Total chunks whose recomputed hash did not match the declared hash"
    );
    describe_counter!("ingest_merges_succeeded_total", "Total merges that produced a final object");
    describe_counter!("ingest_merges_failed_total", "Total merge jobs that exhausted their retries");
    describe_counter!("ingest_merge_retries_total", "Total merge retry attempts, including backoff retries");
    describe_counter!("ingest_jobs_failed_permanently_total", "Total jobs written to the failed-jobs ledger");

    describe_gauge!("ingest_job_queue_depth", "Approximate number of pending jobs in job_queue");

    describe_histogram!("ingest_merge_duration_seconds", "Time spent inside a single merge attempt");
}

pub fn record_chunk_saved() {
    counter!("ingest_chunks_saved_total").increment(1);
}

pub fn record_chunk_hash_mismatch() {
    counter!("ingest_chunk_hash_mismatches_total").increment(1);
}

pub fn record_merge_succeeded() {
    counter!("ingest_merges_succeeded_total").increment(1);
}

pub fn record_merge_failed() {
    counter!("ingest_merges_failed_total").increment(1);
}

pub fn record_merge_retry() {
    counter!("ingest_merge_retries_total").increment(1);
}

pub fn record_job_failed_permanently() {
    counter!("ingest_jobs_failed_permanently_total").increment(1);
}

pub fn set_queue_depth(depth: f64) {
    gauge!("ingest_job_queue_depth").set(depth);
}

/// Timer for a merge attempt; call `stop` to record the elapsed duration.
pub struct MergeTimer {
    start: Instant,
}

impl MergeTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn stop(self) {
        histogram!("ingest_merge_duration_seconds").record(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn merge_timer_records_without_panicking() {
        init_metrics();
        let timer = MergeTimer::start();
        timer.stop();
    }
}
