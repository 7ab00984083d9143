//! Rolling-window rate limiting.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateLimit;

/// Sliding-window limiter over an ordered queue of grant timestamps.
///
/// At most `max_requests` acquisitions are granted inside any
/// window-sized interval. The slot decision happens under one lock
/// acquisition; waiting happens with the lock released, and a waiter
/// re-checks after sleeping because another task may have taken the
/// freed slot.
///
/// Independent instances share nothing. The harvester runs one for the
/// listing/detail source and one for the extraction service.
#[derive(Debug)]
pub struct RollingWindowLimiter {
    max_requests: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RollingWindowLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            max_requests: limit.max_requests.max(1),
            window: limit.window,
            grants: Mutex::new(VecDeque::new()),
        }
    }

    /// Block until a slot is free, then record the grant.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut grants = self.grants.lock().await;
                let now = Instant::now();
                self.prune(&mut grants, now);
                if grants.len() < self.max_requests {
                    grants.push_back(now);
                    return;
                }
                // Front is the oldest in-window grant; its expiry frees
                // the next slot.
                (grants[0] + self.window).saturating_duration_since(now)
            };
            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                "rate limit window full; waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Grants currently inside the window.
    pub async fn in_window(&self) -> usize {
        let mut grants = self.grants.lock().await;
        let now = Instant::now();
        self.prune(&mut grants, now);
        grants.len()
    }

    fn prune(&self, grants: &mut VecDeque<Instant>, now: Instant) {
        while grants
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.window)
        {
            grants.pop_front();
        }
    }
}
