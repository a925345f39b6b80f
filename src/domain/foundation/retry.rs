//! Bounded retry policy and the combinators that apply it.
//!
//! Retry semantics live in a [`RetryPolicy`] value rather than at the call
//! site. The combinators only ever retry errors the predicate approves, so
//! validation and parse failures pass straight through.

use std::future::Future;
use std::time::Duration;

/// Errors that know whether a repeat attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for super::AgentError {
    fn is_retryable(&self) -> bool {
        super::AgentError::is_retryable(self)
    }
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    None,
    Fixed(Duration),
    /// Doubles from `initial` on every attempt, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => d,
            Backoff::Exponential { initial, max } => {
                let shift = retry.saturating_sub(1).min(16);
                initial.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Backoff::None)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            3,
            Backoff::Exponential {
                initial: Duration::from_millis(250),
                max: Duration::from_secs(2),
            },
        )
    }
}

/// Outcome of a retried operation plus the number of attempts it took.
#[derive(Debug)]
pub struct RetryReport<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl<T, E> RetryReport<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Runs `op` under `policy`, retrying while the error reports itself retryable.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, op: F) -> RetryReport<T, E>
where
    E: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_if(policy, |e: &E| e.is_retryable(), op).await
}

/// Runs `op` under `policy`, retrying while `should_retry` approves the error.
///
/// `op` receives the 1-based attempt number. The last error is returned once
/// attempts are exhausted.
pub async fn with_retry_if<T, E, P, F, Fut>(
    policy: &RetryPolicy,
    should_retry: P,
    mut op: F,
) -> RetryReport<T, E>
where
    P: Fn(&E) -> bool,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                return RetryReport {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(err) => {
                if attempt >= max || !should_retry(&err) {
                    return RetryReport {
                        result: Err(err),
                        attempts: attempt,
                    };
                }
                let delay = policy.backoff.delay(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
