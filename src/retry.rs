/// Retry wrapper with bounded exponential backoff and jitter.
///
/// Wraps a fallible operation; only errors accepted by the caller's
/// predicate are retried. Delay before retry `n` (1-based) is
/// `min(initial * 2^(n-1), max_delay) + uniform(0, max_jitter)`.

use rand::Rng;
use std::time::Duration;

/// Backoff schedule for transient HTTP failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(32),
            max_jitter: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps. Used by tests and one-shot tooling.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            max_attempts,
        }
    }

    /// Backoff before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let secs = rand::thread_rng().gen_range(0.0..=self.max_jitter.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. The last error is returned.
    pub fn run<T, E, F, P>(&self, mut op: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    let delay = self.backoff(attempt) + self.jitter();
                    log::warn!(
                        "attempt {}/{} failed: {}; retrying in {:.1}s",
                        attempt,
                        self.max_attempts,
                        e,
                        delay.as_secs_f64()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(8));
        assert_eq!(policy.backoff(3), Duration::from_secs(16));
        assert_eq!(policy.backoff(4), Duration::from_secs(32));
        assert_eq!(policy.backoff(5), Duration::from_secs(32), "capped at max_delay");
        assert_eq!(policy.backoff(40), Duration::from_secs(32));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            assert!(policy.jitter() <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_retries_until_success() {
        let calls = Cell::new(0);
        let result: Result<u32, String> = RetryPolicy::immediate(5).run(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 { Err("connection reset".to_string()) } else { Ok(7) }
            },
            |_| true,
        );
        assert_eq!(result, Ok(7));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), String> = RetryPolicy::immediate(4).run(
            || {
                calls.set(calls.get() + 1);
                Err(format!("failure #{}", calls.get()))
            },
            |_| true,
        );
        assert_eq!(result, Err("failure #4".to_string()));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_non_retryable_error_is_attempted_once() {
        let calls = Cell::new(0);
        let result: Result<(), String> = RetryPolicy::immediate(10).run(
            || {
                calls.set(calls.get() + 1);
                Err("401".to_string())
            },
            |e| e != "401",
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
