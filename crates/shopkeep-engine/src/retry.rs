//! Bounded retry with class-dependent backoff.
//!
//! Wraps any fallible async operation whose error implements
//! [`Retryable`]. Timeout-class failures back off exponentially (transient
//! load), other retryable failures linearly (usually one more render is
//! enough), and terminal failures propagate immediately without consuming
//! any retry budget.

use std::time::Duration;

use thiserror::Error;

use shopkeep_core::{RetryClass, Retryable};

// ─── Policy ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RetryPolicy {
  /// Total invocations, not re-invocations: `max_attempts = 3` runs the
  /// operation at most three times.
  pub max_attempts: u32,
  pub base_delay:   Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 3, base_delay: Duration::from_secs(5) }
  }
}

impl RetryPolicy {
  /// Backoff before re-running after the (0-based) `attempt`th failure.
  pub fn delay_for(&self, class: RetryClass, attempt: u32) -> Duration {
    match class {
      RetryClass::Timeout => self.base_delay * 2u32.saturating_pow(attempt),
      RetryClass::Retryable => self.base_delay * (attempt + 1),
      RetryClass::Terminal => Duration::ZERO,
    }
  }
}

// ─── Runner ──────────────────────────────────────────────────────────────────

/// Run `op` under `policy`, sleeping between attempts. Fails with the last
/// attempt's error after exhaustion.
pub async fn retry<T, E, F>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T, E>
where
  F: AsyncFnMut() -> Result<T, E>,
  E: Retryable + std::fmt::Display,
{
  let mut attempt: u32 = 0;
  loop {
    match op().await {
      Ok(value) => return Ok(value),
      Err(error) => {
        let class = error.retry_class();
        attempt += 1;
        if class == RetryClass::Terminal || attempt >= policy.max_attempts {
          return Err(error);
        }
        let delay = policy.delay_for(class, attempt - 1);
        tracing::warn!(
          operation,
          attempt,
          max_attempts = policy.max_attempts,
          delay_ms = delay.as_millis() as u64,
          %error,
          "operation failed, backing off before retry"
        );
        tokio::time::sleep(delay).await;
      }
    }
  }
}

// ─── Per-attempt timeouts ────────────────────────────────────────────────────

/// Adds an explicit per-attempt deadline to an operation. An elapsed
/// deadline is a timeout-class error, not a crash.
#[derive(Debug, Error)]
pub enum Timed<E: std::error::Error + 'static> {
  #[error("attempt deadline elapsed")]
  Elapsed,

  #[error(transparent)]
  Inner(E),
}

impl<E> Retryable for Timed<E>
where
  E: std::error::Error + Retryable + 'static,
{
  fn retry_class(&self) -> RetryClass {
    match self {
      Self::Elapsed => RetryClass::Timeout,
      Self::Inner(e) => e.retry_class(),
    }
  }
}

/// Run `fut` against `deadline`, mapping both failure shapes into [`Timed`].
pub async fn with_deadline<T, E, Fut>(deadline: Duration, fut: Fut) -> Result<T, Timed<E>>
where
  E: std::error::Error + 'static,
  Fut: Future<Output = Result<T, E>>,
{
  match tokio::time::timeout(deadline, fut).await {
    Ok(result) => result.map_err(Timed::Inner),
    Err(_) => Err(Timed::Elapsed),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  #[derive(Debug, Error)]
  #[error("{message}")]
  struct FakeError {
    message: String,
    class:   RetryClass,
  }

  impl FakeError {
    fn retryable(message: &str) -> Self {
      Self { message: message.to_string(), class: RetryClass::Retryable }
    }

    fn terminal(message: &str) -> Self {
      Self { message: message.to_string(), class: RetryClass::Terminal }
    }
  }

  impl Retryable for FakeError {
    fn retry_class(&self) -> RetryClass {
      self.class
    }
  }

  fn fast_policy() -> RetryPolicy {
    RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(1) }
  }

  #[tokio::test]
  async fn succeeds_without_retrying() {
    let calls = AtomicU32::new(0);
    let result: Result<u32, FakeError> = retry(&fast_policy(), "op", async || {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok(7)
    })
    .await;
    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn retries_until_success() {
    let calls = AtomicU32::new(0);
    let result: Result<u32, FakeError> = retry(&fast_policy(), "op", async || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      if n < 2 { Err(FakeError::retryable("flaky")) } else { Ok(42) }
    })
    .await;
    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn invokes_at_most_max_attempts_and_returns_last_error() {
    let calls = AtomicU32::new(0);
    let result: Result<(), FakeError> = retry(&fast_policy(), "op", async || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      Err(FakeError::retryable(&format!("failure {n}")))
    })
    .await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.unwrap_err().to_string(), "failure 2");
  }

  #[tokio::test]
  async fn terminal_errors_propagate_on_first_attempt() {
    let calls = AtomicU32::new(0);
    let result: Result<(), FakeError> = retry(&fast_policy(), "op", async || {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(FakeError::terminal("rejected"))
    })
    .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.unwrap_err().to_string(), "rejected");
  }

  #[test]
  fn timeout_backoff_is_exponential() {
    let policy = RetryPolicy { max_attempts: 5, base_delay: Duration::from_secs(2) };
    assert_eq!(policy.delay_for(RetryClass::Timeout, 0), Duration::from_secs(2));
    assert_eq!(policy.delay_for(RetryClass::Timeout, 1), Duration::from_secs(4));
    assert_eq!(policy.delay_for(RetryClass::Timeout, 2), Duration::from_secs(8));
  }

  #[test]
  fn generic_backoff_is_linear() {
    let policy = RetryPolicy { max_attempts: 5, base_delay: Duration::from_secs(2) };
    assert_eq!(policy.delay_for(RetryClass::Retryable, 0), Duration::from_secs(2));
    assert_eq!(policy.delay_for(RetryClass::Retryable, 1), Duration::from_secs(4));
    assert_eq!(policy.delay_for(RetryClass::Retryable, 2), Duration::from_secs(6));
  }

  #[tokio::test]
  async fn deadline_elapse_is_timeout_class() {
    let result: Result<(), Timed<FakeError>> = with_deadline(
      Duration::from_millis(5),
      async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
      },
    )
    .await;
    let err = result.unwrap_err();
    assert_eq!(err.retry_class(), RetryClass::Timeout);
  }
}
