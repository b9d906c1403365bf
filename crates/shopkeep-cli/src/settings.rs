//! Runtime configuration, deserialised from `config.toml` with
//! `SHOPKEEP_*` environment overrides.

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use serde::Deserialize;
use shopkeep_engine::{EngineConfig, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub api:        ApiSection,
  #[serde(default)]
  pub generation: GenerationSection,
  #[serde(default)]
  pub bridge:     BridgeSection,
  #[serde(default)]
  pub engine:     EngineSection,
}

fn default_store_path() -> PathBuf {
  PathBuf::from("shopkeep.db")
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      store_path: default_store_path(),
      api:        ApiSection::default(),
      generation: GenerationSection::default(),
      bridge:     BridgeSection::default(),
      engine:     EngineSection::default(),
    }
  }
}

impl AppConfig {
  /// Layer the TOML file (optional) under `SHOPKEEP_*` environment
  /// overrides, e.g. `SHOPKEEP_GENERATION__API_KEY`.
  pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("SHOPKEEP").separator("__"))
      .build()
      .context("failed to read configuration")?;

    settings
      .try_deserialize()
      .context("failed to deserialise AppConfig")
  }
}

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
}

fn default_host() -> String {
  "127.0.0.1".to_string()
}

fn default_port() -> u16 {
  7010
}

impl Default for ApiSection {
  fn default() -> Self {
    Self { host: default_host(), port: default_port() }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSection {
  #[serde(default = "default_generation_url")]
  pub base_url:     String,
  #[serde(default)]
  pub api_key:      String,
  #[serde(default = "default_model")]
  pub model:        String,
  #[serde(default = "default_generation_timeout")]
  pub timeout_secs: u64,
}

fn default_generation_url() -> String {
  "https://api.openai.com".to_string()
}

fn default_model() -> String {
  "gpt-4o-mini".to_string()
}

fn default_generation_timeout() -> u64 {
  90
}

impl Default for GenerationSection {
  fn default() -> Self {
    Self {
      base_url:     default_generation_url(),
      api_key:      String::new(),
      model:        default_model(),
      timeout_secs: default_generation_timeout(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSection {
  #[serde(default = "default_bridge_url")]
  pub base_url:     String,
  #[serde(default = "default_bridge_timeout")]
  pub timeout_secs: u64,
}

fn default_bridge_url() -> String {
  "http://127.0.0.1:7020".to_string()
}

fn default_bridge_timeout() -> u64 {
  60
}

impl Default for BridgeSection {
  fn default() -> Self {
    Self { base_url: default_bridge_url(), timeout_secs: default_bridge_timeout() }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
  #[serde(default = "default_max_sessions")]
  pub max_sessions:             usize,
  #[serde(default = "default_max_scan_passes")]
  pub max_scan_passes:          u32,
  #[serde(default = "default_per_store_batch")]
  pub per_store_batch:          usize,
  #[serde(default = "default_generation_deadline")]
  pub generation_deadline_secs: u64,
  #[serde(default = "default_max_tokens")]
  pub max_tokens:               u32,
  #[serde(default = "default_retry_attempts")]
  pub retry_max_attempts:       u32,
  #[serde(default = "default_retry_base_delay")]
  pub retry_base_delay_secs:    u64,
}

fn default_max_sessions() -> usize {
  4
}

fn default_max_scan_passes() -> u32 {
  10
}

fn default_per_store_batch() -> usize {
  10
}

fn default_generation_deadline() -> u64 {
  60
}

fn default_max_tokens() -> u32 {
  450
}

fn default_retry_attempts() -> u32 {
  3
}

fn default_retry_base_delay() -> u64 {
  5
}

impl Default for EngineSection {
  fn default() -> Self {
    Self {
      max_sessions:             default_max_sessions(),
      max_scan_passes:          default_max_scan_passes(),
      per_store_batch:          default_per_store_batch(),
      generation_deadline_secs: default_generation_deadline(),
      max_tokens:               default_max_tokens(),
      retry_max_attempts:       default_retry_attempts(),
      retry_base_delay_secs:    default_retry_base_delay(),
    }
  }
}

impl EngineSection {
  pub fn to_engine_config(&self) -> EngineConfig {
    EngineConfig {
      max_sessions:        self.max_sessions,
      max_scan_passes:     self.max_scan_passes,
      per_store_batch:     self.per_store_batch,
      generation_deadline: Duration::from_secs(self.generation_deadline_secs),
      max_tokens:          self.max_tokens,
      retry:               RetryPolicy {
        max_attempts: self.retry_max_attempts,
        base_delay:   Duration::from_secs(self.retry_base_delay_secs),
      },
    }
  }
}
