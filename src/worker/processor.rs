use async_trait::async_trait;

/// The out-of-scope media processing collaborator. Only the interface the
/// engine calls into after a successful merge is modeled here; transcoding,
/// catalog writes, and everything else belong to that external system.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    async fn handle_merge_success(
        &self,
        session_id: &str,
        filename: &str,
        merged_path: &str,
        total_chunks: u32,
    );
}

/// Default collaborator used when no real media processor is wired in: logs
/// the notification and does nothing else.
pub struct LoggingMediaProcessor;

#[async_trait]
impl MediaProcessor for LoggingMediaProcessor {
    async fn handle_merge_success(
        &self,
        session_id: &str,
        filename: &str,
        merged_path: &str,
        total_chunks: u32,
    ) {
        tracing::info!(
            session_id,
            filename,
            merged_path,
            total_chunks,
            "merge succeeded, notifying media processor"
        );
    }
}
