//! Time source for the acquisition wait loop
//!
//! Elapsed time is always measured on a monotonic clock so wall-clock
//! adjustments cannot move the wait-timeout boundary.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Monotonic clock plus the sleep used between polls
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer
///
/// Honors `tokio::time::pause`, so tests can run the 1s/5s backoff in
/// virtual time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleep_advances_now() {
        let clock = TokioClock;
        let start = clock.now();
        clock.sleep(Duration::from_secs(5)).await;
        assert!(clock.now().duration_since(start) >= Duration::from_secs(5));
    }
}
