//! Platform adapter backed by a browser-automation sidecar.
//!
//! The sidecar owns the actual browser processes, selectors, and
//! anti-automation evasion; this crate only speaks its JSON session API.
//! Keeping the browser in a separate process is a deployment choice for
//! crash containment — the core never depends on it.
//!
//! Session API:
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/sessions` | `{"platform": ...}` → `{"session_id": ...}` |
//! | `POST` | `/sessions/{id}/login` | `{"username", "password"}` |
//! | `POST` | `/sessions/{id}/navigate` | `{"native_code"}` |
//! | `POST` | `/sessions/{id}/candidates` | `{}` → `{"candidates": [...]}` (renders one pass, scrolling on repeat calls) |
//! | `POST` | `/sessions/{id}/reply` | `{"element_id", "text"}` |
//!
//! Failures come back as non-2xx with `{"code", "message"}`; `code` maps
//! onto the adapter error taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use shopkeep_core::{
  adapter::{AdapterError, AdapterFactory, PlatformAdapter},
  matching::MatchCandidate,
  review::Platform,
};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenSessionBody {
  platform: Platform,
}

#[derive(Debug, Deserialize)]
struct OpenSessionResponse {
  session_id: String,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
  username: &'a str,
  password: &'a str,
}

#[derive(Debug, Serialize)]
struct NavigateBody<'a> {
  native_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct CandidatesResponse {
  candidates: Vec<MatchCandidate>,
}

#[derive(Debug, Serialize)]
struct ReplyBody<'a> {
  element_id: &'a str,
  text:       &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
  #[serde(default)]
  code:    String,
  #[serde(default)]
  message: String,
}

// ─── Error mapping ───────────────────────────────────────────────────────────

fn map_transport(e: reqwest::Error) -> AdapterError {
  if e.is_timeout() {
    AdapterError::ElementDiscoveryTimeout(e.to_string())
  } else {
    AdapterError::Session(e.to_string())
  }
}

fn map_envelope(envelope: ErrorEnvelope) -> AdapterError {
  let message = if envelope.message.is_empty() {
    envelope.code.clone()
  } else {
    envelope.message
  };
  match envelope.code.as_str() {
    "auth_failed" => AdapterError::AuthenticationFailed,
    "navigation_failed" => AdapterError::NavigationFailed(message),
    "discovery_timeout" => AdapterError::ElementDiscoveryTimeout(message),
    "submission_rejected" => AdapterError::SubmissionRejected(message),
    _ => AdapterError::Session(message),
  }
}

// ─── Factory ─────────────────────────────────────────────────────────────────

/// Connection settings for the automation sidecar.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
  /// Sidecar root, e.g. `http://localhost:7020`.
  pub base_url: String,
  /// Per-request deadline. Rendering-bound calls can take tens of seconds.
  pub timeout:  Duration,
}

/// One factory per platform; the sidecar multiplexes them.
pub struct BridgeFactory {
  platform: Platform,
  client:   Client,
  config:   BridgeConfig,
}

impl BridgeFactory {
  pub fn new(platform: Platform, config: BridgeConfig) -> Result<Self, AdapterError> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| AdapterError::Session(e.to_string()))?;
    Ok(Self { platform, client, config })
  }
}

#[async_trait]
impl AdapterFactory for BridgeFactory {
  fn platform(&self) -> Platform {
    self.platform
  }

  async fn connect(&self) -> Result<Box<dyn PlatformAdapter>, AdapterError> {
    let url = format!("{}/sessions", self.config.base_url.trim_end_matches('/'));
    let response = self
      .client
      .post(&url)
      .json(&OpenSessionBody { platform: self.platform })
      .send()
      .await
      .map_err(map_transport)?;

    let opened: OpenSessionResponse = decode(response).await?;
    tracing::debug!(platform = %self.platform, session = %opened.session_id, "sidecar session opened");

    Ok(Box::new(BridgeAdapter {
      client:     self.client.clone(),
      base_url:   self.config.base_url.trim_end_matches('/').to_string(),
      session_id: opened.session_id,
    }))
  }
}

async fn decode<T: serde::de::DeserializeOwned>(
  response: reqwest::Response,
) -> Result<T, AdapterError> {
  let status = response.status();
  if status.is_success() {
    response.json().await.map_err(map_transport)
  } else {
    let envelope = response
      .json::<ErrorEnvelope>()
      .await
      .unwrap_or_else(|_| ErrorEnvelope {
        code:    String::new(),
        message: format!("sidecar returned {status}"),
      });
    Err(map_envelope(envelope))
  }
}

async fn expect_ok(response: reqwest::Response) -> Result<(), AdapterError> {
  let status = response.status();
  if status.is_success() {
    return Ok(());
  }
  let envelope = response
    .json::<ErrorEnvelope>()
    .await
    .unwrap_or_else(|_| ErrorEnvelope {
      code:    String::new(),
      message: format!("sidecar returned {status}"),
    });
  Err(map_envelope(envelope))
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// One sidecar browser session, serially owned by its store worker.
pub struct BridgeAdapter {
  client:     Client,
  base_url:   String,
  session_id: String,
}

impl BridgeAdapter {
  fn url(&self, operation: &str) -> String {
    format!("{}/sessions/{}/{operation}", self.base_url, self.session_id)
  }
}

#[async_trait]
impl PlatformAdapter for BridgeAdapter {
  async fn login(&mut self, username: &str, password: &str) -> Result<(), AdapterError> {
    let response = self
      .client
      .post(self.url("login"))
      .json(&LoginBody { username, password })
      .send()
      .await
      .map_err(map_transport)?;
    expect_ok(response).await
  }

  async fn navigate_to_review_list(&mut self, native_code: &str) -> Result<(), AdapterError> {
    let response = self
      .client
      .post(self.url("navigate"))
      .json(&NavigateBody { native_code })
      .send()
      .await
      .map_err(map_transport)?;
    expect_ok(response).await
  }

  async fn render_candidates(&mut self) -> Result<Vec<MatchCandidate>, AdapterError> {
    let response = self
      .client
      .post(self.url("candidates"))
      .json(&serde_json::json!({}))
      .send()
      .await
      .map_err(map_transport)?;
    let rendered: CandidatesResponse = decode(response).await?;
    Ok(rendered.candidates)
  }

  async fn submit_reply(&mut self, element_id: &str, text: &str) -> Result<(), AdapterError> {
    let response = self
      .client
      .post(self.url("reply"))
      .json(&ReplyBody { element_id, text })
      .send()
      .await
      .map_err(map_transport)?;
    expect_ok(response).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn envelope(code: &str, message: &str) -> ErrorEnvelope {
    ErrorEnvelope { code: code.to_string(), message: message.to_string() }
  }

  #[test]
  fn sidecar_codes_map_onto_the_taxonomy() {
    assert!(matches!(
      map_envelope(envelope("auth_failed", "bad password")),
      AdapterError::AuthenticationFailed
    ));
    assert!(matches!(
      map_envelope(envelope("navigation_failed", "store page 404")),
      AdapterError::NavigationFailed(_)
    ));
    assert!(matches!(
      map_envelope(envelope("discovery_timeout", "no review cards after 30s")),
      AdapterError::ElementDiscoveryTimeout(_)
    ));
    assert!(matches!(
      map_envelope(envelope("submission_rejected", "blocked phrase")),
      AdapterError::SubmissionRejected(_)
    ));
  }

  #[test]
  fn unknown_codes_fall_back_to_session_errors() {
    assert!(matches!(
      map_envelope(envelope("kaboom", "browser crashed")),
      AdapterError::Session(_)
    ));
    assert!(matches!(
      map_envelope(envelope("", "")),
      AdapterError::Session(_)
    ));
  }
}
