//! Fixed-interval, bounded polling.

use log::debug;
use std::thread;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// How many times to poll, and how long to sleep between polls.
///
/// The total wall-clock time spent waiting is bounded by
/// `(max_attempts - 1) * interval` plus the time taken by the attempts
/// themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Call `attempt` until it yields `Some`, returns an error, or the
    /// attempt budget runs out.
    ///
    /// `attempt` receives the 1-based attempt number. Returns `Ok(None)` when
    /// every attempt came back empty.
    pub fn poll<T, E>(
        &self,
        mut attempt: impl FnMut(u32) -> Result<Option<T>, E>,
    ) -> Result<Option<T>, E> {
        for n in 1..=self.max_attempts {
            if let Some(value) = attempt(n)? {
                return Ok(Some(value));
            }
            if n < self.max_attempts {
                debug!("Attempt {n}/{} came back empty, retrying", self.max_attempts);
                thread::sleep(self.interval);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_returns_first_success() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let mut calls = 0;
        let result: Result<_, ()> = policy.poll(|n| {
            calls += 1;
            Ok((n == 3).then_some(n))
        });
        assert_eq!(result, Ok(Some(3)));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_exhausted_budget_is_none() {
        let policy = RetryPolicy::new(30, Duration::from_millis(1));
        let mut calls = 0;
        let start = Instant::now();
        let result: Result<Option<()>, ()> = policy.poll(|_| {
            calls += 1;
            Ok(None)
        });
        assert_eq!(result, Ok(None));
        assert_eq!(calls, 30);
        // 29 sleeps between 30 attempts
        assert!(start.elapsed() >= Duration::from_millis(29));
    }

    #[test]
    fn test_error_stops_polling() {
        let policy = RetryPolicy::new(10, Duration::ZERO);
        let mut calls = 0;
        let result: Result<Option<()>, &str> = policy.poll(|n| {
            calls += 1;
            if n == 2 {
                Err("boom")
            } else {
                Ok(None)
            }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_zero_attempts_never_calls() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let result: Result<Option<()>, ()> =
            policy.poll(|_| panic!("should not be called"));
        assert_eq!(result, Ok(None));
    }
}
