//! Retry policy for the firmware-directory hot-plug race
//!
//! Right after a card is plugged (or its driver rebinds), the `rom*`
//! firmware subdirectory of a user function may not be populated yet. The
//! classifier retries the prefix search a bounded number of times with a
//! fixed delay. The wait goes through the [`Sleeper`] port so tests can
//! exercise the retry loop without wall-clock time.

use std::time::Duration;

use async_trait::async_trait;

/// Bounded retry with a fixed inter-attempt delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the initial probe.
    pub max_attempts: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }
}

/// Port for the inter-attempt wait.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production adapter backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts calls instead of sleeping.
    struct CountingSleeper(AtomicU32);

    #[async_trait]
    impl Sleeper for CountingSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_counting_sleeper_counts() {
        let sleeper = CountingSleeper(AtomicU32::new(0));
        sleeper.sleep(Duration::from_secs(3)).await;
        sleeper.sleep(Duration::from_secs(3)).await;
        assert_eq!(sleeper.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_policy_matches_driver_settle_time() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(3));
    }
}
