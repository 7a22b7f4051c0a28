use std::path::PathBuf;

/// Process-wide configuration, loaded once at startup from the environment.
///
/// Mirrors the original service's `LoadConfig`: every field has a default so the
/// process can boot with zero configuration in development.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub queue: QueueConfig,
    pub job_store: JobStoreConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub temp_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub max_file_size: u64,
    pub chunk_size: u64,
    pub worker_pool_size: usize,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_host: String,
    pub redis_port: u16,
}

#[derive(Debug, Clone)]
pub struct JobStoreConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment, falling back to the documented
    /// defaults for anything unset. Reads a `.env` file first if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            server: ServerConfig {
                host: get_env("SERVER_HOST", "0.0.0.0"),
                port: get_env_as("SERVER_PORT", 3000),
            },
            upload: UploadConfig {
                temp_dir: PathBuf::from(get_env("UPLOAD_TEMP_DIR", "temp_uploads")),
                uploads_dir: PathBuf::from(get_env("UPLOAD_DIR", "uploads")),
                max_file_size: get_env_as("UPLOAD_MAX_FILE_SIZE", 5 * 1024 * 1024 * 1024),
                chunk_size: get_env_as("UPLOAD_CHUNK_SIZE", 10 * 1024 * 1024),
                worker_pool_size: get_env_as("WORKER_POOL_SIZE", 5),
            },
            queue: QueueConfig {
                redis_host: get_env("REDIS_HOST", "127.0.0.1"),
                redis_port: get_env_as("REDIS_PORT", 6379),
            },
            job_store: JobStoreConfig {
                path: get_env("JOB_STORE_PATH", "failed_jobs.db"),
            },
            metrics: MetricsConfig {
                port: get_env_as("METRICS_PORT", 9090),
            },
        }
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.queue.redis_host, self.queue.redis_port)
    }
}

fn get_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_as<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        std::env::remove_var("SERVER_PORT");
        std::env::remove_var("UPLOAD_CHUNK_SIZE");
        let config = Config::from_env();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upload.chunk_size, 10 * 1024 * 1024);
        assert_eq!(config.upload.max_file_size, 5 * 1024 * 1024 * 1024);
        assert_eq!(config.upload.worker_pool_size, 5);
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn env_overrides_default() {
        std::env::set_var("SERVER_PORT", "4100");
        let config = Config::from_env();
        assert_eq!(config.server.port, 4100);
        std::env::remove_var("SERVER_PORT");
    }
}
