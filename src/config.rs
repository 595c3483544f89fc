use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// base url every api path is appended to
    pub api_base_url: String,
    /// directory holding the persisted `token` and `user` entries
    pub session_dir: PathBuf,
    /// per-attempt timeout for rename/move/delete/create-directory
    pub mutation_timeout_secs: u64,
    /// retries after the first failed mutation attempt
    pub max_retries: u32,
    /// linear back-off unit between mutation attempts
    pub retry_delay_ms: u64,
    /// how long a finished transfer stays queryable
    pub cleanup_grace_ms: u64,
    /// system status poll interval
    pub status_poll_secs: u64,
    /// number of tokio worker threads
    pub worker_threads: usize,
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let session_dir = std::env::var("AFS_SESSION_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_session_dir());

        Self {
            api_base_url: std::env::var("AFS_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8080/api".to_string()),
            session_dir,
            mutation_timeout_secs: parse_env("AFS_MUTATION_TIMEOUT_SECS", 10),
            max_retries: parse_env("AFS_MAX_RETRIES", 2),
            retry_delay_ms: parse_env("AFS_RETRY_DELAY_MS", 1000),
            cleanup_grace_ms: parse_env("AFS_CLEANUP_GRACE_MS", 1000),
            status_poll_secs: parse_env("AFS_STATUS_POLL_SECS", 5),
            worker_threads: parse_env("WORKER_THREADS", 2),
        }
    }

    // per-user config dir, or a dot dir next to the binary's cwd
    fn default_session_dir() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("afs-client"),
            None => {
                tracing::warn!("No config directory available, keeping session in ./.afs-session");
                PathBuf::from("./.afs-session")
            }
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            attempt_timeout: (self.mutation_timeout_secs > 0)
                .then(|| Duration::from_secs(self.mutation_timeout_secs)),
        }
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_secs.max(1))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
