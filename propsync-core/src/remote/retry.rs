use std::future::Future;
use std::time::Duration;

use super::error::RemoteError;

/// Bounded exponential backoff for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry (doubles each retry).
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let mut backoff = self.initial_backoff;
        for _ in 1..attempt {
            backoff = (backoff * 2).min(self.max_backoff);
        }
        backoff.min(self.max_backoff)
    }

    /// Runs `op`, retrying only on [`RemoteError::RateLimited`].
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(e) if e.is_rate_limited() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.backoff_for(attempt);
                    tracing::warn!(
                        "{}: rate limited, retry {}/{} after {:?}",
                        what,
                        attempt,
                        self.max_retries,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }
}
