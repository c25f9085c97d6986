//! Centralized retry policy.
//!
//! Every retried external call in the engine goes through one [`Retry`]
//! value, so attempt counts, spacing and jitter are uniform and visible
//! in one place instead of scattered ad-hoc loops.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::traits::Clock;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed,
    /// Delay doubles after every failed attempt.
    Exponential,
}

/// A retry policy: attempt budget, base delay, growth and jitter.
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Base delay between attempts.
    pub delay: Duration,
    /// Delay growth mode.
    pub backoff: Backoff,
    /// Add up to half the computed delay of random jitter.
    pub jitter: bool,
}

impl Retry {
    /// Fixed spacing, no jitter. Used for HTTP data-source fetches.
    pub const fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            backoff: Backoff::Fixed,
            jitter: false,
        }
    }

    /// Exponential backoff with jitter. Used for chain RPC calls.
    pub const fn exponential(attempts: u32, base: Duration) -> Self {
        Self {
            attempts,
            delay: base,
            backoff: Backoff::Exponential,
            jitter: true,
        }
    }

    /// Delay to wait after the `n`th failed attempt (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => self.delay.saturating_mul(1u32 << (attempt - 1).min(16)),
        };
        if self.jitter && !base.is_zero() {
            let extra = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
            base + Duration::from_millis(extra)
        } else {
            base
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    /// Returns the last error on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, clock: &dyn Clock, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts => {
                    let wait = self.delay_after(attempt);
                    warn!(
                        what,
                        attempt,
                        of = self.attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    clock.sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    /// Clock whose sleeps complete instantly but are tallied.
    #[derive(Default)]
    struct TestClock {
        slept_ms: AtomicU64,
    }

    #[async_trait]
    impl Clock for TestClock {
        fn now_unix(&self) -> u64 {
            0
        }

        async fn sleep(&self, duration: Duration) {
            self.slept_ms
                .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn succeeds_without_spending_the_budget() {
        let clock = TestClock::default();
        let policy = Retry::fixed(3, Duration::from_secs(2));
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = policy
            .run(&clock, "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(clock.slept_ms.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retries_then_returns_the_last_error() {
        let clock = TestClock::default();
        let policy = Retry::fixed(3, Duration::from_secs(2));
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = policy
            .run(&clock, "test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("boom {n}")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "boom 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two waits of 2 s each between the three attempts.
        assert_eq!(clock.slept_ms.load(Ordering::SeqCst), 4_000);
    }

    #[tokio::test]
    async fn recovers_mid_budget() {
        let clock = TestClock::default();
        let policy = Retry::fixed(3, Duration::from_millis(100));
        let calls = AtomicU32::new(0);

        let result: Result<&str, &str> = policy
            .run(&clock, "test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err("transient")
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn exponential_delays_double() {
        let policy = Retry {
            attempts: 4,
            delay: Duration::from_secs(1),
            backoff: Backoff::Exponential,
            jitter: false,
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }
}
