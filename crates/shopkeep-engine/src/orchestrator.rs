//! The per-review pipeline and the per-store session flow.
//!
//! One store means one authenticated platform session, serially owned by
//! one worker: claim → locate → generate/gate loop → submit → persist. Every
//! exit path leaves the record either terminal (with a taxonomy code in
//! `error_reason`) or released back to `pending`.

use chrono::{Local, NaiveDate};
use tokio::sync::watch;

use shopkeep_core::{
  adapter::{AdapterError, AdapterFactory, PlatformAdapter},
  gate::{QualityGate, ReplyAttempt},
  lifecycle::ReplyStatus,
  matching::Matcher,
  policy::StoreProfile,
  review::ReviewRecord,
  store::{ReviewStore, StatusUpdate},
  generate::ReplyGenerator,
};

use crate::{
  error::{Error, FailureKind, Result},
  locate::locate_review,
  prompt,
  retry::{retry, with_deadline},
  runner::EngineConfig,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// How one claimed review left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
  Posted,
  Failed(FailureKind),
  ManualRequired(FailureKind),
  /// Cooperative cancellation: the claim was released, nothing terminal was
  /// written.
  Cancelled,
}

/// Tally of one store's processing batch.
#[derive(Debug, Clone, Default)]
pub struct StoreReport {
  pub store_code:      String,
  pub posted:          u32,
  pub failed:          u32,
  pub manual_required: u32,
  pub cancelled:       u32,
  /// Outside the store's reply hours; nothing was claimed.
  pub skipped:         bool,
  /// A session- or store-level fault that ended the batch early.
  pub error:           Option<String>,
}

impl StoreReport {
  fn new(store_code: &str) -> Self {
    Self { store_code: store_code.to_string(), ..Self::default() }
  }

  fn tally(&mut self, outcome: ReviewOutcome) {
    match outcome {
      ReviewOutcome::Posted => self.posted += 1,
      ReviewOutcome::Failed(_) => self.failed += 1,
      ReviewOutcome::ManualRequired(_) => self.manual_required += 1,
      ReviewOutcome::Cancelled => self.cancelled += 1,
    }
  }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Drives claimed reviews end-to-end against injected gateways.
pub struct Orchestrator<S, G> {
  store:     S,
  generator: G,
  matcher:   Matcher,
  gate:      QualityGate,
  config:    EngineConfig,
}

impl<S, G> Orchestrator<S, G>
where
  S: ReviewStore,
  G: ReplyGenerator,
{
  pub fn new(store: S, generator: G, matcher: Matcher, gate: QualityGate, config: EngineConfig) -> Self {
    Self { store, generator, matcher, gate, config }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  // ── Per-store session flow ────────────────────────────────────────────────

  /// Process one store's pending reviews on a single platform session.
  pub async fn process_store(
    &self,
    profile: &StoreProfile,
    factory: &dyn AdapterFactory,
    cancel:  &watch::Receiver<bool>,
  ) -> StoreReport {
    let mut report = StoreReport::new(&profile.store_code);

    if let Some(hours) = profile.policy.reply_hours
      && !hours.contains(Local::now().time())
    {
      tracing::info!(store = %profile.store_code, "outside reply hours, skipping store");
      report.skipped = true;
      return report;
    }

    // Claim before opening a session; an idle store never opens one.
    let first = match self.store.claim_next_pending(&profile.store_code).await {
      Ok(Some(review)) => review,
      Ok(None) => return report,
      Err(e) => {
        report.error = Some(e.to_string());
        return report;
      }
    };

    let mut adapter = match self.open_session(profile, factory).await {
      Ok(adapter) => adapter,
      Err(e) => {
        // The claimed review must not linger in `generating`.
        let kind = FailureKind::from_adapter(&e);
        let persisted = self
          .transition(
            &first,
            ReplyStatus::Generating,
            ReplyStatus::Failed,
            reason(kind, &e.to_string()),
          )
          .await;
        if let Err(persist_err) = persisted {
          tracing::error!(store = %profile.store_code, error = %persist_err, "failed to persist session failure");
        }
        report.failed += 1;
        report.error = Some(e.to_string());
        return report;
      }
    };

    let today = Local::now().date_naive();
    let mut next = Some(first);
    let mut processed = 0usize;

    while let Some(review) = next.take() {
      let outcome = match self
        .process_review(adapter.as_mut(), &review, profile, today, cancel)
        .await
      {
        Ok(outcome) => outcome,
        Err(e) => {
          tracing::error!(review_id = %review.review_id, error = %e, "store error mid-pipeline, releasing claim");
          if let Err(release_err) = self.store.release_claim(&review.review_id).await {
            tracing::error!(review_id = %review.review_id, error = %release_err, "release failed");
          }
          report.error = Some(e.to_string());
          break;
        }
      };

      report.tally(outcome);
      processed += 1;

      if outcome == ReviewOutcome::Cancelled
        || processed >= self.config.per_store_batch
        || *cancel.borrow()
      {
        break;
      }

      next = match self.store.claim_next_pending(&profile.store_code).await {
        Ok(n) => n,
        Err(e) => {
          report.error = Some(e.to_string());
          break;
        }
      };
    }

    report
  }

  async fn open_session(
    &self,
    profile: &StoreProfile,
    factory: &dyn AdapterFactory,
  ) -> Result<Box<dyn PlatformAdapter>, AdapterError> {
    let retry_policy = &self.config.retry;

    let mut adapter =
      retry(retry_policy, "connect", async || factory.connect().await).await?;

    retry(retry_policy, "login", async || {
      adapter.login(&profile.username, &profile.password).await
    })
    .await?;

    retry(retry_policy, "navigate_to_review_list", async || {
      adapter.navigate_to_review_list(&profile.native_code).await
    })
    .await?;

    Ok(adapter)
  }

  // ── Per-review pipeline ───────────────────────────────────────────────────

  /// Drive one claimed (`generating`) review to a terminal state, or release
  /// it on cancellation.
  pub async fn process_review(
    &self,
    adapter: &mut dyn PlatformAdapter,
    review:  &ReviewRecord,
    profile: &StoreProfile,
    today:   NaiveDate,
    cancel:  &watch::Receiver<bool>,
  ) -> Result<ReviewOutcome> {
    let policy = &profile.policy;
    let id = &review.review_id;

    if !policy.allows_rating(review.rating) {
      self
        .transition(
          review,
          ReplyStatus::Generating,
          ReplyStatus::ManualRequired,
          reason(FailureKind::AutoReplyDisabled, "auto-reply disabled for this rating"),
        )
        .await?;
      return Ok(ReviewOutcome::ManualRequired(FailureKind::AutoReplyDisabled));
    }

    // Locate the review in the live rendering.
    let located = match locate_review(
      adapter,
      &self.matcher,
      review,
      today,
      self.config.max_scan_passes,
      &self.config.retry,
    )
    .await
    {
      Ok(result) => result,
      Err(e) => {
        let kind = FailureKind::from_adapter(&e);
        self
          .transition(review, ReplyStatus::Generating, ReplyStatus::Failed, reason(kind, &e.to_string()))
          .await?;
        return Ok(ReviewOutcome::Failed(kind));
      }
    };

    let Some(candidate) = located.candidate else {
      self
        .transition(
          review,
          ReplyStatus::Generating,
          ReplyStatus::Failed,
          reason(FailureKind::ReviewNotFound, "no rendered candidate cleared the match threshold"),
        )
        .await?;
      return Ok(ReviewOutcome::Failed(FailureKind::ReviewNotFound));
    };

    if *cancel.borrow() {
      return self.release(review).await;
    }

    // Generation + gate loop.
    let mut attempts = review.generation_attempts;
    let accepted_text = loop {
      let request = prompt::build_request(review, policy, self.config.max_tokens);
      let generated = retry(&self.config.retry, "generate_reply", async || {
        with_deadline(self.config.generation_deadline, self.generator.generate(&request)).await
      })
      .await;

      let generated = match generated {
        Ok(g) => g,
        Err(e) => {
          self
            .transition(
              review,
              ReplyStatus::Generating,
              ReplyStatus::Failed,
              reason(FailureKind::GenerationFailed, &e.to_string()),
            )
            .await?;
          return Ok(ReviewOutcome::Failed(FailureKind::GenerationFailed));
        }
      };

      attempts += 1;
      self
        .transition(
          review,
          ReplyStatus::Generating,
          ReplyStatus::QualityReview,
          StatusUpdate { generation_attempts: Some(attempts), ..Default::default() },
        )
        .await?;

      let text = prompt::apply_greetings(&generated.text, policy);
      let verdict = self.gate.evaluate(&text, review, policy);
      let attempt = ReplyAttempt::from_verdict(text, &verdict);
      tracing::info!(
        review_id = %id,
        attempt = attempts,
        score = verdict.score,
        accepted = verdict.accepted,
        reasons = ?verdict.reasons,
        tokens = generated.token_usage,
        "gate verdict"
      );

      if attempt.accepted {
        self
          .transition(
            review,
            ReplyStatus::QualityReview,
            ReplyStatus::Ready,
            StatusUpdate {
              reply_text: Some(attempt.text.clone()),
              quality_score: Some(attempt.quality_score),
              ..Default::default()
            },
          )
          .await?;
        break attempt.text;
      }

      if attempts >= policy.max_regen {
        let detail = attempt
          .rejection_reasons
          .iter()
          .cloned()
          .collect::<Vec<_>>()
          .join(", ");
        self
          .transition(
            review,
            ReplyStatus::QualityReview,
            ReplyStatus::ManualRequired,
            reason(FailureKind::GenerationRejected, &detail),
          )
          .await?;
        return Ok(ReviewOutcome::ManualRequired(FailureKind::GenerationRejected));
      }

      // Regenerate.
      self
        .transition(review, ReplyStatus::QualityReview, ReplyStatus::Generating, StatusUpdate::default())
        .await?;

      if *cancel.borrow() {
        return self.release(review).await;
      }
    };

    if *cancel.borrow() {
      return self.release(review).await;
    }

    // Submission.
    self
      .transition(review, ReplyStatus::Ready, ReplyStatus::Posting, StatusUpdate::default())
      .await?;

    let submitted = retry(&self.config.retry, "submit_reply", async || {
      adapter.submit_reply(&candidate.element_id, &accepted_text).await
    })
    .await;

    match submitted {
      Ok(()) => {
        self
          .transition(review, ReplyStatus::Posting, ReplyStatus::Posted, StatusUpdate::default())
          .await?;
        tracing::info!(review_id = %id, "reply posted");
        Ok(ReviewOutcome::Posted)
      }
      Err(e @ AdapterError::SubmissionRejected(_)) => {
        self
          .transition(
            review,
            ReplyStatus::Posting,
            ReplyStatus::ManualRequired,
            reason(FailureKind::SubmissionRejected, &e.to_string()),
          )
          .await?;
        Ok(ReviewOutcome::ManualRequired(FailureKind::SubmissionRejected))
      }
      Err(e) => {
        let kind = match e {
          AdapterError::ElementDiscoveryTimeout(_) => FailureKind::ElementDiscoveryTimeout,
          _ => FailureKind::SubmissionFailed,
        };
        self
          .transition(review, ReplyStatus::Posting, ReplyStatus::Failed, reason(kind, &e.to_string()))
          .await?;
        Ok(ReviewOutcome::Failed(kind))
      }
    }
  }

  // ── Persistence helpers ───────────────────────────────────────────────────

  async fn transition(
    &self,
    review: &ReviewRecord,
    from:   ReplyStatus,
    to:     ReplyStatus,
    update: StatusUpdate,
  ) -> Result<()> {
    let applied = self
      .store
      .update_status(&review.review_id, from, to, update)
      .await
      .map_err(Error::store)?;
    if !applied {
      // Another writer moved the record first; this view is stale.
      tracing::warn!(
        review_id = %review.review_id,
        %from,
        %to,
        "status transition not applied (stale expectation)"
      );
    }
    Ok(())
  }

  async fn release(&self, review: &ReviewRecord) -> Result<ReviewOutcome> {
    tracing::info!(review_id = %review.review_id, "cancelled, releasing claim");
    self
      .store
      .release_claim(&review.review_id)
      .await
      .map_err(Error::store)?;
    Ok(ReviewOutcome::Cancelled)
  }
}

/// A [`StatusUpdate`] that only records a terminal-failure reason.
fn reason(kind: FailureKind, detail: &str) -> StatusUpdate {
  let error_reason = if detail.is_empty() {
    kind.as_code().to_string()
  } else {
    format!("{}: {detail}", kind.as_code())
  };
  StatusUpdate { error_reason: Some(error_reason), ..Default::default() }
}
