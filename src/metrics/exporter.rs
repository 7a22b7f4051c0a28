//! Prometheus metrics exporter: exposes recorded metrics via HTTP for scraping.

use crate::metrics::recorder::init_metrics;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

static EXPORTER_STARTED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9090".parse().unwrap(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to set up metrics: {0}")]
    SetupFailed(String),
}

/// Initialize metric descriptions, install the Prometheus recorder and spawn
/// its HTTP scrape listener on the tokio runtime. Idempotent: a second call
/// is a no-op. Must be called from inside a tokio runtime.
pub async fn start_metrics_server(config: MetricsConfig) -> Result<(), MetricsError> {
    init_metrics();

    if EXPORTER_STARTED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .install()
        .map_err(|e| MetricsError::SetupFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_expected_port() {
        let config = MetricsConfig::default();
        assert_eq!(config.listen_addr.port(), 9090);
    }
}
