//! `shopkeep` — review-reply automation for storefront platforms.
//!
//! # Usage
//!
//! ```
//! shopkeep serve                 # JSON API for ingestion and inspection
//! shopkeep run                   # one processing sweep over every store
//! shopkeep add-store --store-code ST001 --platform baemin ...
//! shopkeep ingest reviews.json   # load scraped reviews from a file
//! ```

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use shopkeep_bridge::{BridgeConfig, BridgeFactory};
use shopkeep_core::{
  gate::QualityGate,
  matching::Matcher,
  policy::{StorePolicy, StoreProfile},
  review::{NewReview, Platform},
  store::{Ingested, ReviewStore},
};
use shopkeep_engine::{AdapterRegistry, Engine, Orchestrator};
use shopkeep_gen::{ChatGenerator, GeneratorConfig};
use shopkeep_store_sqlite::SqliteStore;

use settings::AppConfig;

// ─── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Review-reply automation for storefront platforms")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API.
  Serve,

  /// Run one processing sweep: claim pending reviews, generate, gate, post.
  Run,

  /// Create or replace a store profile.
  AddStore {
    #[arg(long)]
    store_code:  String,
    /// One of: baemin, yogiyo, coupang_eats, naver.
    #[arg(long)]
    platform:    String,
    /// The platform's own identifier for the store.
    #[arg(long)]
    native_code: String,
    #[arg(long)]
    username:    String,
    #[arg(long)]
    password:    String,
    /// Optional TOML file with the store's reply policy; defaults apply
    /// otherwise.
    #[arg(long)]
    policy:      Option<PathBuf>,
  },

  /// Ingest scraped reviews from a JSON file (an array of review objects).
  Ingest {
    file: PathBuf,
  },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let app_config = AppConfig::load(&cli.config)?;

  let store_path = expand_tilde(&app_config.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Serve => serve(store, &app_config).await,
    Command::Run => run_sweep(store, &app_config).await,
    Command::AddStore {
      store_code,
      platform,
      native_code,
      username,
      password,
      policy,
    } => add_store(store, store_code, platform, native_code, username, password, policy).await,
    Command::Ingest { file } => ingest(store, &file).await,
  }
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn serve(store: SqliteStore, app_config: &AppConfig) -> anyhow::Result<()> {
  let app = axum::Router::new()
    .nest("/api", shopkeep_api::api_router(Arc::new(store)))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", app_config.api.host, app_config.api.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

// ─── Run ─────────────────────────────────────────────────────────────────────

async fn run_sweep(store: SqliteStore, app_config: &AppConfig) -> anyhow::Result<()> {
  let generator = ChatGenerator::new(GeneratorConfig {
    base_url: app_config.generation.base_url.clone(),
    api_key:  app_config.generation.api_key.clone(),
    model:    app_config.generation.model.clone(),
    timeout:  Duration::from_secs(app_config.generation.timeout_secs),
  })
  .context("failed to build generation client")?;

  let bridge_config = BridgeConfig {
    base_url: app_config.bridge.base_url.clone(),
    timeout:  Duration::from_secs(app_config.bridge.timeout_secs),
  };
  let mut registry = AdapterRegistry::new();
  for platform in [
    Platform::Baemin,
    Platform::Yogiyo,
    Platform::CoupangEats,
    Platform::Naver,
  ] {
    let factory = BridgeFactory::new(platform, bridge_config.clone())
      .map_err(|e| anyhow::anyhow!("failed to build {platform} bridge: {e}"))?;
    registry.register(Arc::new(factory));
  }

  let orchestrator = Orchestrator::new(
    store,
    generator,
    Matcher::default(),
    QualityGate::default(),
    app_config.engine.to_engine_config(),
  );
  let engine = Engine::new(orchestrator, registry);

  // Ctrl-C flips the cooperative cancellation flag; workers finish or
  // release their current review and stop claiming.
  let (cancel_tx, cancel_rx) = watch::channel(false);
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::info!("interrupt received, winding down");
      let _ = cancel_tx.send(true);
    }
  });

  let summary = engine.run_once(cancel_rx).await?;

  println!(
    "stores: {} processed, {} skipped",
    summary.stores_processed, summary.stores_skipped
  );
  println!(
    "reviews: {} posted, {} failed, {} manual, {} cancelled",
    summary.posted, summary.failed, summary.manual_required, summary.cancelled
  );
  for report in &summary.reports {
    if let Some(error) = &report.error {
      println!("  {}: {error}", report.store_code);
    }
  }
  Ok(())
}

// ─── Add store ───────────────────────────────────────────────────────────────

async fn add_store(
  store:       SqliteStore,
  store_code:  String,
  platform:    String,
  native_code: String,
  username:    String,
  password:    String,
  policy_path: Option<PathBuf>,
) -> anyhow::Result<()> {
  let platform = Platform::parse(&platform)
    .map_err(|e| anyhow::anyhow!("{e} (expected baemin, yogiyo, coupang_eats, or naver)"))?;

  let policy = match policy_path {
    Some(path) => {
      let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading policy file {}", path.display()))?;
      toml::from_str::<StorePolicy>(&raw).context("parsing policy file")?
    }
    None => StorePolicy::default(),
  };

  store
    .upsert_store(StoreProfile {
      store_code: store_code.clone(),
      platform,
      native_code,
      username,
      password,
      policy,
    })
    .await
    .context("failed to write store profile")?;

  println!("store {store_code} saved");
  Ok(())
}

// ─── Ingest ──────────────────────────────────────────────────────────────────

async fn ingest(store: SqliteStore, file: &Path) -> anyhow::Result<()> {
  let raw = std::fs::read_to_string(file)
    .with_context(|| format!("reading {}", file.display()))?;
  let reviews: Vec<NewReview> =
    serde_json::from_str(&raw).context("parsing review file")?;

  let mut inserted = 0usize;
  let mut duplicates = 0usize;
  for review in reviews {
    match store.ingest(review).await.context("ingest failed")? {
      Ingested::Inserted(_) => inserted += 1,
      Ingested::Duplicate(_) => duplicates += 1,
    }
  }

  println!("{inserted} inserted, {duplicates} duplicates");
  Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
