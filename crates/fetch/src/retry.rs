//! Bounded retry with quadratic backoff.

use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ErrorKind, Result};

/// Something that can wait.
///
/// Lets tests swap the real [`ThreadSleeper`] for one that returns
/// immediately and records what it was asked to do.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Never waits.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

/// How many times to try, and how long to wait in between.
///
/// The delay after failed attempt `i` (1-based) is `i² × backoff_unit`. With
/// the defaults that is 3 attempts and waits of 1s then 4s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_unit: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self { max_attempts, backoff_unit }
    }

    /// Delay to wait after the given failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt.saturating_mul(attempt))
    }

    /// Runs `operation` until it succeeds, fails with an error that is not
    /// [retryable](ErrorKind::is_retryable), or runs out of attempts.
    ///
    /// `operation` receives the 1-based attempt number.
    pub fn run<T>(&self, url: &str, sleeper: &dyn Sleeper, operation: impl FnMut(u32) -> Result<T>) -> Result<T> {
        self.run_with(url, sleeper, ErrorKind::is_retryable, operation)
    }

    /// Same as [`run`](Self::run), with a custom idea of what is transient.
    ///
    /// # Errors
    ///
    /// A non-transient failure is returned untouched. Once the attempts are
    /// used up, the last failure is raised as [`ErrorKind::Exhausted`].
    pub fn run_with<T>(
        &self,
        url: &str,
        sleeper: &dyn Sleeper,
        is_transient: impl Fn(&ErrorKind) -> bool,
        mut operation: impl FnMut(u32) -> Result<T>,
    ) -> Result<T> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            debug!(url, attempt, "attempting");
            let err = match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&*err) => err,
                Err(err) => return Err(err),
            };
            if attempt >= max_attempts {
                return Err(err.raise(ErrorKind::Exhausted { url: url.to_string(), attempts: attempt }));
            }
            let delay = self.delay(attempt);
            let kind: &ErrorKind = &err;
            warn!(url, attempt, ?delay, error = %kind, "transient failure, retrying");
            sleeper.sleep(delay);
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingSleeper;
    use rstest::rstest;

    fn timeout(url: &str) -> Result<()> {
        exn::bail!(ErrorKind::Timeout(url.to_string()))
    }

    #[rstest]
    #[case(1, Duration::from_secs(1))]
    #[case(2, Duration::from_secs(4))]
    #[case(3, Duration::from_secs(9))]
    fn test_quadratic_delay(#[case] attempt: u32, #[case] expected: Duration) {
        assert_eq!(RetryPolicy::default().delay(attempt), expected);
    }

    #[test]
    fn test_gives_up_after_ceiling() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let err = RetryPolicy::default()
            .run("https://a", &sleeper, |_| {
                calls += 1;
                timeout("https://a")
            })
            .unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(*err, ErrorKind::Exhausted { url: "https://a".to_string(), attempts: 3 });
        assert_eq!(sleeper.delays(), [Duration::from_secs(1), Duration::from_secs(4)]);
    }

    #[test]
    fn test_recovers_after_transient_failure() {
        let sleeper = RecordingSleeper::default();
        let value = RetryPolicy::default()
            .run("https://a", &sleeper, |attempt| match attempt {
                1 => exn::bail!(ErrorKind::Timeout("https://a".to_string())),
                n => Ok(n),
            })
            .unwrap();
        assert_eq!(value, 2);
        assert_eq!(sleeper.delays(), [Duration::from_secs(1)]);
    }

    #[test]
    fn test_permanent_failure_is_not_retried() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let err = RetryPolicy::default()
            .run("https://a", &sleeper, |_| -> Result<()> {
                calls += 1;
                exn::bail!(ErrorKind::Status("https://a".to_string(), 404))
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(*err, ErrorKind::Status("https://a".to_string(), 404));
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn test_custom_transient_predicate() {
        let mut calls = 0;
        let err = RetryPolicy::new(2, Duration::ZERO)
            .run_with("https://a", &NoSleep, |_| true, |_| -> Result<()> {
                calls += 1;
                exn::bail!(ErrorKind::Network("https://a".to_string()))
            })
            .unwrap_err();
        assert_eq!(calls, 2);
        assert!(matches!(*err, ErrorKind::Exhausted { attempts: 2, .. }));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let mut calls = 0;
        let _ = RetryPolicy::new(0, Duration::ZERO).run("https://a", &NoSleep, |_| {
            calls += 1;
            timeout("https://a")
        });
        assert_eq!(calls, 1);
    }
}
