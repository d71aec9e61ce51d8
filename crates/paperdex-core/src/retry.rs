//! Reusable retry policy shared by every driver

use std::time::Duration;

use crate::error::ApiError;

/// Delay schedule as a function of the 1-based attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `step × attempt`
    Linear(Duration),
    /// `base × 2^(attempt-1)`
    Exponential(Duration),
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(d) => d,
            Self::Linear(step) => step.saturating_mul(attempt.max(1)),
            Self::Exponential(base) => {
                base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            }
        }
    }
}

/// Errors the policy knows how to classify.
pub trait Retryable: std::fmt::Display {
    fn is_retryable(&self) -> bool;

    fn is_rate_limited(&self) -> bool {
        false
    }

    /// Server-provided wait, which overrides the computed backoff when longer
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        ApiError::is_retryable(self)
    }

    fn is_rate_limited(&self) -> bool {
        ApiError::is_rate_limited(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        ApiError::retry_after(self)
    }
}

/// Retry ceiling and backoff, with rate limits kept apart from other failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub rate_limit: Backoff,
    pub transient: Backoff,
}

/// Retries exhausted, or a non-retryable error on some attempt.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last: E,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (after {} attempt(s))", self.last, self.attempts)
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}

impl RetryPolicy {
    /// Cursor-paginated APIs: 5 attempts, 10 s × attempt on 429, 5 s otherwise
    pub const fn cursor_default() -> Self {
        Self {
            max_attempts: 5,
            rate_limit: Backoff::Linear(Duration::from_secs(10)),
            transient: Backoff::Fixed(Duration::from_secs(5)),
        }
    }

    /// Bulk file downloads: exponential 2 s, 4 s, 8 s ...
    pub const fn bulk_default() -> Self {
        Self {
            max_attempts: 4,
            rate_limit: Backoff::Linear(Duration::from_secs(10)),
            transient: Backoff::Exponential(Duration::from_secs(2)),
        }
    }

    /// Single-call adapters: a couple of quick retries
    pub const fn api_default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit: Backoff::Linear(Duration::from_secs(5)),
            transient: Backoff::Exponential(Duration::from_secs(1)),
        }
    }

    /// No sleeping at all; for tests and fakes.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            rate_limit: Backoff::Fixed(Duration::ZERO),
            transient: Backoff::Fixed(Duration::ZERO),
        }
    }

    /// Wait before attempt `attempt + 1`, given the error from `attempt`.
    pub fn delay_for<E: Retryable>(&self, error: &E, attempt: u32) -> Duration {
        let computed = if error.is_rate_limited() {
            self.rate_limit.delay(attempt)
        } else {
            self.transient.delay(attempt)
        };
        match error.retry_after() {
            Some(hint) if hint > computed => hint,
            _ => computed,
        }
    }

    /// Run `op` until it succeeds, fails permanently or exhausts attempts.
    pub fn run<T, E: Retryable>(
        &self,
        label: &str,
        mut op: impl FnMut(u32) -> Result<T, E>,
    ) -> Result<T, RetryError<E>> {
        let max = self.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) if attempt < max && e.is_retryable() => {
                    let delay = self.delay_for(&e, attempt);
                    if e.is_rate_limited() {
                        log::warn!(
                            "{label}: rate limited (attempt {attempt}/{max}), waiting {}s",
                            delay.as_secs()
                        );
                    } else {
                        log::debug!(
                            "{label}: attempt {attempt}/{max} failed: {e}, retrying in {}ms",
                            delay.as_millis()
                        );
                    }
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("{label}: failed permanently after {attempt} attempt(s): {e}");
                    return Err(RetryError {
                        attempts: attempt,
                        last: e,
                    });
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::api_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn backoff_schedules() {
        let s = Duration::from_secs;
        assert_eq!(Backoff::Fixed(s(5)).delay(3), s(5));
        assert_eq!(Backoff::Linear(s(10)).delay(1), s(10));
        assert_eq!(Backoff::Linear(s(10)).delay(3), s(30));
        assert_eq!(Backoff::Exponential(s(2)).delay(1), s(2));
        assert_eq!(Backoff::Exponential(s(2)).delay(3), s(8));
    }

    #[test]
    fn rate_limit_uses_its_own_schedule() {
        let policy = RetryPolicy::cursor_default();
        let limited = ApiError::RateLimited { retry_after: None };
        let broken = ApiError::Http {
            status: Some(502),
            message: String::new(),
        };
        assert_eq!(policy.delay_for(&limited, 2), Duration::from_secs(20));
        assert_eq!(policy.delay_for(&broken, 2), Duration::from_secs(5));
    }

    #[test]
    fn retry_after_hint_wins_when_longer() {
        let policy = RetryPolicy::cursor_default();
        let err = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(policy.delay_for(&err, 1), Duration::from_secs(60));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = RetryPolicy::immediate(5).run("test", |_| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(ApiError::Timeout)
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(5).run("test", |_| {
            calls.set(calls.get() + 1);
            Err(ApiError::RateLimited { retry_after: None })
        });
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 5);
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn non_retryable_stops_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(5).run("test", |_| {
            calls.set(calls.get() + 1);
            Err(ApiError::Http {
                status: Some(404),
                message: "missing".into(),
            })
        });
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.get(), 1);
    }
}
