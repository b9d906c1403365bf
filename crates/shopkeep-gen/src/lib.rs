//! HTTP implementation of the text-generation gateway.
//!
//! Talks to any OpenAI-compatible chat-completion endpoint. The gateway is
//! treated as an unreliable remote call: errors carry a retry class so the
//! engine's retry layer can tell transient load from hard API rejections.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shopkeep_core::{
  RetryClass, Retryable,
  generate::{GeneratedReply, GenerationRequest, ReplyGenerator},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("generation API returned {status}: {body}")]
  Api { status: u16, body: String },

  #[error("generation API returned no completion")]
  EmptyCompletion,
}

impl Retryable for Error {
  fn retry_class(&self) -> RetryClass {
    match self {
      Self::Http(e) if e.is_timeout() => RetryClass::Timeout,
      Self::Http(_) => RetryClass::Retryable,
      // Rate limits and server faults are worth another attempt; any other
      // 4xx means the request itself is wrong.
      Self::Api { status, .. } => {
        if *status == 429 || *status >= 500 {
          RetryClass::Retryable
        } else {
          RetryClass::Terminal
        }
      }
      Self::EmptyCompletion => RetryClass::Retryable,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
  model:       &'a str,
  messages:    [ChatMessage<'a>; 2],
  temperature: f32,
  max_tokens:  u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
  role:    &'a str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<Choice>,
  usage:   Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
  content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
  total_tokens: u32,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Connection settings for the generation endpoint.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
  /// Endpoint root, e.g. `https://api.openai.com`.
  pub base_url: String,
  pub api_key:  String,
  pub model:    String,
  pub timeout:  Duration,
}

/// Chat-completion client implementing [`ReplyGenerator`].
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ChatGenerator {
  client: Client,
  config: GeneratorConfig,
}

impl ChatGenerator {
  pub fn new(config: GeneratorConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!(
      "{}/v1/chat/completions",
      self.config.base_url.trim_end_matches('/')
    )
  }
}

impl ReplyGenerator for ChatGenerator {
  type Error = Error;

  async fn generate<'a>(&'a self, request: &'a GenerationRequest) -> Result<GeneratedReply> {
    let body = ChatRequest {
      model:       &self.config.model,
      messages:    [
        ChatMessage { role: "system", content: &request.system_prompt },
        ChatMessage { role: "user", content: &request.user_prompt },
      ],
      temperature: request.temperature,
      max_tokens:  request.max_tokens,
    };

    let response = self
      .client
      .post(self.url())
      .bearer_auth(&self.config.api_key)
      .json(&body)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Api { status: status.as_u16(), body });
    }

    let completion: ChatResponse = response.json().await?;
    let token_usage = completion.usage.map(|u| u.total_tokens).unwrap_or(0);
    let text = completion
      .choices
      .into_iter()
      .next()
      .map(|c| c.message.content.trim().to_string())
      .filter(|t| !t.is_empty())
      .ok_or(Error::EmptyCompletion)?;

    tracing::debug!(tokens = token_usage, chars = text.chars().count(), "generation complete");
    Ok(GeneratedReply { text, token_usage })
  }
}
