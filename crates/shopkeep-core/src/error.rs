//! Error types for `shopkeep-core`, plus the retry classification shared by
//! every externally-flaky operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown platform: {0:?}")]
  UnknownPlatform(String),

  #[error("unknown reply status: {0:?}")]
  UnknownStatus(String),

  #[error("rating out of range (expected 1..=5): {0}")]
  RatingOutOfRange(u8),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Retry classification ────────────────────────────────────────────────────

/// How the retry layer should treat a failure.
///
/// Timeouts indicate transient load and back off exponentially; other
/// retryable faults usually need just one more render and back off linearly.
/// Terminal faults propagate without consuming any retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
  Terminal,
  Retryable,
  Timeout,
}

/// Implemented by the error types of operations run under the retry layer.
pub trait Retryable {
  fn retry_class(&self) -> RetryClass;

  fn is_retryable(&self) -> bool {
    !matches!(self.retry_class(), RetryClass::Terminal)
  }
}
