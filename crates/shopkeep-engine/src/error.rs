//! Engine error type and the terminal-failure taxonomy persisted to
//! `error_reason`.

use thiserror::Error;

use shopkeep_core::{adapter::AdapterError, review::Platform};

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("adapter error: {0}")]
  Adapter(#[from] AdapterError),

  #[error("no adapter registered for platform {0}")]
  UnsupportedPlatform(Platform),

  #[error("store profile not found: {0}")]
  StoreNotFound(String),
}

impl Error {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Failure taxonomy ────────────────────────────────────────────────────────

/// Why a review left the pipeline without a posted reply. The code string is
/// what gets persisted to `error_reason`, so it stays stable and greppable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  AuthenticationFailed,
  NavigationFailed,
  ElementDiscoveryTimeout,
  ReviewNotFound,
  /// The generation gateway kept failing (transport/API), distinct from the
  /// gate rejecting its output.
  GenerationFailed,
  /// Every generation attempt was rejected by the quality gate.
  GenerationRejected,
  /// The platform itself refused the reply text.
  SubmissionRejected,
  /// Submission kept failing for transport reasons.
  SubmissionFailed,
  /// Store policy disables auto-reply for this review's rating.
  AutoReplyDisabled,
}

impl FailureKind {
  pub fn as_code(&self) -> &'static str {
    match self {
      Self::AuthenticationFailed => "authentication_failed",
      Self::NavigationFailed => "navigation_failed",
      Self::ElementDiscoveryTimeout => "element_discovery_timeout",
      Self::ReviewNotFound => "review_not_found",
      Self::GenerationFailed => "generation_failed",
      Self::GenerationRejected => "generation_rejected",
      Self::SubmissionRejected => "submission_rejected",
      Self::SubmissionFailed => "submission_failed",
      Self::AutoReplyDisabled => "auto_reply_disabled",
    }
  }

  /// The taxonomy code for an adapter failure that exhausted (or bypassed)
  /// its retry budget.
  pub fn from_adapter(e: &AdapterError) -> Self {
    match e {
      AdapterError::AuthenticationFailed => Self::AuthenticationFailed,
      AdapterError::NavigationFailed(_) => Self::NavigationFailed,
      AdapterError::ElementDiscoveryTimeout(_) => Self::ElementDiscoveryTimeout,
      AdapterError::SubmissionRejected(_) => Self::SubmissionRejected,
      AdapterError::Session(_) => Self::NavigationFailed,
    }
  }
}

impl std::fmt::Display for FailureKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_code())
  }
}
