// Pacing between items that hit third-party APIs

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Called after an item that made at least one external call
    async fn wait(&self);
}

/// Sleeps for a fixed delay every time
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl RateLimiter for FixedDelay {
    async fn wait(&self) {
        tracing::trace!("Pacing: waiting {:?}", self.delay);
        tokio::time::sleep(self.delay).await;
    }
}

/// Never waits
pub struct NoDelay;

#[async_trait]
impl RateLimiter for NoDelay {
    async fn wait(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_sleeps() {
        let limiter = FixedDelay::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_returns_immediately() {
        let start = Instant::now();
        NoDelay.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
