//! Cross-store fan-out.
//!
//! One long-lived worker task per store; parallelism across stores is
//! bounded by a counting semaphore because one platform session is roughly
//! one OS-level browser process on the sidecar, and the platforms
//! themselves tolerate only so much automation.

use std::{sync::Arc, time::Duration};

use tokio::{
  sync::{Semaphore, watch},
  task::JoinSet,
};

use shopkeep_core::{generate::ReplyGenerator, store::ReviewStore};

use crate::{
  error::{Error, Result},
  orchestrator::{Orchestrator, StoreReport},
  registry::AdapterRegistry,
  retry::RetryPolicy,
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Concurrent platform sessions across stores.
  pub max_sessions:        usize,
  /// Rendering passes before a review counts as not found.
  pub max_scan_passes:     u32,
  /// Reviews processed per store per run.
  pub per_store_batch:     usize,
  /// Deadline for a single generation attempt.
  pub generation_deadline: Duration,
  /// Token budget handed to the generation gateway.
  pub max_tokens:          u32,
  pub retry:               RetryPolicy,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_sessions:        4,
      max_scan_passes:     10,
      per_store_batch:     10,
      generation_deadline: Duration::from_secs(60),
      max_tokens:          450,
      retry:               RetryPolicy::default(),
    }
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
  pub stores_processed: u32,
  pub stores_skipped:   u32,
  pub posted:           u32,
  pub failed:           u32,
  pub manual_required:  u32,
  pub cancelled:        u32,
  pub reports:          Vec<StoreReport>,
}

impl RunSummary {
  fn absorb(&mut self, report: StoreReport) {
    if report.skipped {
      self.stores_skipped += 1;
    } else {
      self.stores_processed += 1;
    }
    self.posted += report.posted;
    self.failed += report.failed;
    self.manual_required += report.manual_required;
    self.cancelled += report.cancelled;
    self.reports.push(report);
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Owns the orchestrator and the adapter lookup table; fans one worker task
/// out per store.
pub struct Engine<S, G> {
  orchestrator: Arc<Orchestrator<S, G>>,
  registry:     Arc<AdapterRegistry>,
}

impl<S, G> Engine<S, G>
where
  S: ReviewStore + 'static,
  G: ReplyGenerator + 'static,
{
  pub fn new(orchestrator: Orchestrator<S, G>, registry: AdapterRegistry) -> Self {
    Self {
      orchestrator: Arc::new(orchestrator),
      registry:     Arc::new(registry),
    }
  }

  /// One full sweep over every configured store.
  ///
  /// Flip `cancel` to `true` to wind the sweep down cooperatively: each
  /// worker finishes (or releases) its current review and stops claiming.
  pub async fn run_once(&self, cancel: watch::Receiver<bool>) -> Result<RunSummary> {
    let stores = self
      .orchestrator
      .store()
      .list_stores()
      .await
      .map_err(Error::store)?;

    let max_sessions = self.orchestrator.config().max_sessions;
    let semaphore = Arc::new(Semaphore::new(max_sessions));
    let mut workers: JoinSet<StoreReport> = JoinSet::new();
    let mut summary = RunSummary::default();

    tracing::info!(stores = stores.len(), max_sessions, "starting sweep");

    for profile in stores {
      let Some(factory) = self.registry.get(profile.platform) else {
        tracing::warn!(
          store = %profile.store_code,
          platform = %profile.platform,
          "no adapter registered, skipping store"
        );
        summary.stores_skipped += 1;
        continue;
      };

      let orchestrator = Arc::clone(&self.orchestrator);
      let semaphore = Arc::clone(&semaphore);
      let cancel = cancel.clone();

      workers.spawn(async move {
        let permit = match semaphore.acquire_owned().await {
          Ok(permit) => permit,
          Err(_) => {
            let mut report = StoreReport::default();
            report.store_code = profile.store_code;
            report.error = Some("session semaphore closed".to_string());
            return report;
          }
        };
        let report = orchestrator
          .process_store(&profile, factory.as_ref(), &cancel)
          .await;
        drop(permit);
        report
      });
    }

    while let Some(joined) = workers.join_next().await {
      match joined {
        Ok(report) => summary.absorb(report),
        Err(e) => tracing::error!(error = %e, "store worker panicked"),
      }
    }

    tracing::info!(
      posted = summary.posted,
      failed = summary.failed,
      manual_required = summary.manual_required,
      cancelled = summary.cancelled,
      "sweep complete"
    );
    Ok(summary)
  }
}
