//! Upload pacing: token bucket in front of the service's file endpoint.
//!
//! Mattermost allows roughly 20 uploads per minute. Instead of drawing a
//! 429 and failing the send, uploads wait for a token:
//!   burst      : uploads allowed back to back
//!   per_minute : sustained refill rate
//!
//! Each upload costs 1 token.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    /// Tokens per second.
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(burst: u32, per_minute: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            tokens: capacity,
            capacity,
            refill_rate: f64::from(per_minute) / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Take a token, or report how long until one is available.
    fn take(&mut self) -> Result<(), Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }
        if self.refill_rate <= 0.0 {
            // No refill configured; poll once a minute.
            return Err(Duration::from_secs(60));
        }
        let missing = 1.0 - self.tokens;
        Err(Duration::from_secs_f64(missing / self.refill_rate))
    }
}

/// Shared upload limiter. `per_minute == 0` leaves only the initial burst.
#[derive(Debug)]
pub struct UploadLimiter {
    bucket: Mutex<TokenBucket>,
}

impl UploadLimiter {
    pub fn new(burst: u32, per_minute: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(burst, per_minute)),
        }
    }

    /// Wait until an upload may proceed.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.bucket.lock().await.take() {
                Ok(()) => return,
                Err(wait) => wait,
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "upload throttled");
            tokio::time::sleep(wait).await;
        }
    }

    #[cfg(test)]
    async fn try_acquire(&self) -> bool {
        self.bucket.lock().await.take().is_ok()
    }
}
