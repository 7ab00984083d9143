//! Bounded retry with exponential backoff for transient fetch failures.

use std::future::Future;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};

/// Backoff schedule: `initial` delay doubling per attempt, capped.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// Total attempts, the first one included
    pub attempts: usize,
    /// Delay before the first retry
    pub initial: Duration,
    /// Upper bound on any single delay
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial: Duration::from_millis(500),
            cap: Duration::from_secs(8),
        }
    }
}

impl Backoff {
    pub fn new(attempts: usize, initial: Duration, cap: Duration) -> Self {
        Self {
            attempts,
            initial,
            cap,
        }
    }

    /// Delay before the retry following `attempt` failures (1-based).
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial.saturating_mul(factor).min(self.cap)
    }
}

/// Run `op`, retrying transient failures per `backoff`.
///
/// Non-transient errors and the final transient failure come back
/// unchanged.
pub async fn with_retries<T, F, Fut>(what: &str, backoff: Backoff, mut op: F) -> FetchResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchResult<T>>,
{
    let attempts = backoff.attempts.max(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                let delay = backoff.delay(attempt as u32);
                tracing::warn!(
                    what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure; retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
