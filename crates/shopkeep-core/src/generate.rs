//! The text-generation gateway contract.
//!
//! Treated as an unreliable remote call: implementations classify their
//! errors so the engine's retry layer can tell timeouts from hard API
//! rejections.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Retryable;

/// One generation request, fully rendered — the gateway does no prompt
/// construction of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
  pub system_prompt: String,
  pub user_prompt:   String,
  pub temperature:   f32,
  pub max_tokens:    u32,
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedReply {
  pub text:        String,
  /// Total tokens billed for the call, for cost tracking.
  pub token_usage: u32,
}

/// Abstraction over the reply-text provider.
pub trait ReplyGenerator: Send + Sync {
  type Error: std::error::Error + Retryable + Send + Sync + 'static;

  fn generate<'a>(
    &'a self,
    request: &'a GenerationRequest,
  ) -> impl Future<Output = Result<GeneratedReply, Self::Error>> + Send + 'a;
}
