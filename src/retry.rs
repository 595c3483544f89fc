//! Bounded retry with linear back-off for the simple mutation requests.
//!
//! One first attempt plus up to `max_retries` retries. The delay before retry
//! `n` (1-based) is `base_delay * n`. When `attempt_timeout` is set every
//! attempt is cut off after that long and counts as a failure.

use std::future::Future;
use std::time::Duration;

use crate::error::NetworkError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
            attempt_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl RetryPolicy {
    /// delay before the given retry (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Run `op` until it succeeds or the policy is exhausted, returning the last error.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, NetworkError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NetworkError>>,
{
    let mut retry = 0;
    loop {
        let outcome = match policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, op()).await {
                Ok(result) => result,
                Err(_) => Err(NetworkError::Timeout(limit)),
            },
            None => op().await,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);
                tracing::warn!(
                    "{} operation failed, retry {}/{} after {:?}: {}",
                    label,
                    retry,
                    policy.max_retries,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
