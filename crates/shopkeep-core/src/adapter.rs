//! The platform-adapter contract.
//!
//! One implementation exists per storefront platform; the orchestration
//! core is written once against this interface and never inspects selector
//! or anti-automation details. The trait is object-safe (via `async_trait`)
//! so concrete adapters can register in a lookup table.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
  error::{RetryClass, Retryable},
  matching::MatchCandidate,
  review::Platform,
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failures surfaced by a platform session, tagged retryable-vs-terminal.
#[derive(Debug, Error)]
pub enum AdapterError {
  /// Credentials rejected. Terminal: credentials are assumed stable within
  /// a run, so retrying cannot help.
  #[error("authentication rejected by the platform")]
  AuthenticationFailed,

  #[error("navigation failed: {0}")]
  NavigationFailed(String),

  /// The page did not surface the expected elements in time. Timeout class:
  /// indicates transient load and benefits from aggressive backoff.
  #[error("element discovery timed out: {0}")]
  ElementDiscoveryTimeout(String),

  /// The platform itself refused the reply (banned phrase, stale review).
  /// Terminal: the text is unacceptable to the platform, not the transport.
  #[error("platform rejected the reply: {0}")]
  SubmissionRejected(String),

  /// Transport or session-state fault (connection reset, stale context).
  #[error("platform session error: {0}")]
  Session(String),
}

impl Retryable for AdapterError {
  fn retry_class(&self) -> RetryClass {
    match self {
      Self::AuthenticationFailed | Self::SubmissionRejected(_) => RetryClass::Terminal,
      Self::ElementDiscoveryTimeout(_) => RetryClass::Timeout,
      Self::NavigationFailed(_) | Self::Session(_) => RetryClass::Retryable,
    }
  }
}

// ─── Session contract ────────────────────────────────────────────────────────

/// One authenticated platform session — a serially-owned resource.
///
/// UI automation state (current page, selected store, open modal) is not
/// safely shareable, so all calls for a given store happen from one worker;
/// the methods take `&mut self` to make that ownership explicit.
#[async_trait]
pub trait PlatformAdapter: Send {
  async fn login(&mut self, username: &str, password: &str) -> Result<(), AdapterError>;

  /// Open the review list of the store identified by the platform's own
  /// `native_code`.
  async fn navigate_to_review_list(&mut self, native_code: &str) -> Result<(), AdapterError>;

  /// Render the currently visible review elements — one matching "pass".
  ///
  /// Successive calls extend the rendering (scroll/pagination), so the
  /// candidate sequence is append-only across passes.
  async fn render_candidates(&mut self) -> Result<Vec<MatchCandidate>, AdapterError>;

  /// Submit `text` as the owner reply on the element previously observed as
  /// `element_id`. Success must mean the platform confirmed the reply.
  async fn submit_reply(&mut self, element_id: &str, text: &str) -> Result<(), AdapterError>;
}

/// Connects fresh sessions for one platform. Registered in the engine's
/// adapter lookup table.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
  fn platform(&self) -> Platform;

  async fn connect(&self) -> Result<Box<dyn PlatformAdapter>, AdapterError>;
}
