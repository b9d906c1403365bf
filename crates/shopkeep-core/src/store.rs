//! The `ReviewStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `shopkeep-store-sqlite`). Higher layers (`shopkeep-engine`,
//! `shopkeep-api`) depend on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  lifecycle::ReplyStatus,
  policy::{StorePolicy, StoreProfile},
  review::{NewReview, ReviewId, ReviewRecord},
};

// ─── Query & update types ────────────────────────────────────────────────────

/// Parameters for [`ReviewStore::list_reviews`].
#[derive(Debug, Clone, Default)]
pub struct ReviewQuery {
  pub store_code: Option<String>,
  pub status:     Option<ReplyStatus>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

/// Outcome of [`ReviewStore::ingest`].
#[derive(Debug, Clone)]
pub enum Ingested {
  Inserted(ReviewRecord),
  /// The derived id already exists; nothing was written.
  Duplicate(ReviewId),
}

impl Ingested {
  pub fn is_inserted(&self) -> bool {
    matches!(self, Self::Inserted(_))
  }
}

/// A guarded status transition plus the fields written alongside it.
/// Fields left `None` are not touched.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
  pub reply_text:          Option<String>,
  pub quality_score:       Option<f32>,
  pub generation_attempts: Option<u32>,
  pub error_reason:        Option<String>,
}

/// Outcome of [`ReviewStore::requeue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueOutcome {
  /// Back to `pending` for another automated attempt.
  Requeued,
  /// The failure ceiling was reached; the record is now `manual_required`.
  Escalated,
  /// Missing, in-flight, or already `posted`; nothing changed.
  NotEligible,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the shopkeep persistence backend.
///
/// Status writes are optimistic conditional updates: they succeed only if
/// the stored status still equals the caller's expected prior status. This
/// is what guarantees at-most-one concurrent processing attempt per review.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ReviewStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Persist a scraped review, deriving its deterministic id.
  ///
  /// Idempotent: re-ingesting the same platform/store/native id returns
  /// [`Ingested::Duplicate`] and writes nothing.
  fn ingest(
    &self,
    input: NewReview,
  ) -> impl Future<Output = Result<Ingested, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_review<'a>(
    &'a self,
    id: &'a ReviewId,
  ) -> impl Future<Output = Result<Option<ReviewRecord>, Self::Error>> + Send + 'a;

  fn list_reviews<'a>(
    &'a self,
    query: &'a ReviewQuery,
  ) -> impl Future<Output = Result<Vec<ReviewRecord>, Self::Error>> + Send + 'a;

  // ── Claiming ──────────────────────────────────────────────────────────

  /// Atomically claim the oldest `pending` review of a store, transitioning
  /// it to `generating`. Concurrent claimants each receive a distinct
  /// record or `None`.
  fn claim_next_pending<'a>(
    &'a self,
    store_code: &'a str,
  ) -> impl Future<Output = Result<Option<ReviewRecord>, Self::Error>> + Send + 'a;

  /// Release an in-flight claim back to `pending` (cooperative
  /// cancellation). Returns `false` if the record had already reached a
  /// state the release does not apply to.
  fn release_claim<'a>(
    &'a self,
    id: &'a ReviewId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Status transitions ────────────────────────────────────────────────

  /// Move `id` from `from` to `to`, writing `update`'s fields in the same
  /// statement. Returns `false` (writing nothing) when the stored status no
  /// longer equals `from` or the transition is not legal.
  fn update_status<'a>(
    &'a self,
    id:     &'a ReviewId,
    from:   ReplyStatus,
    to:     ReplyStatus,
    update: StatusUpdate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Re-arm a record for another automated attempt.
  ///
  /// A `failed` record returns to `pending` while its `requeue_count` is
  /// below the store policy's `max_requeues`; at the ceiling it escalates
  /// to `manual_required` instead. A `manual_required` record always
  /// returns to `pending` with all counters reset — the explicit operator
  /// override, and the only sanctioned way out of a terminal state.
  fn requeue<'a>(
    &'a self,
    id: &'a ReviewId,
  ) -> impl Future<Output = Result<RequeueOutcome, Self::Error>> + Send + 'a;

  // ── Stores & policy ───────────────────────────────────────────────────

  fn upsert_store(
    &self,
    profile: StoreProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_store<'a>(
    &'a self,
    store_code: &'a str,
  ) -> impl Future<Output = Result<Option<StoreProfile>, Self::Error>> + Send + 'a;

  fn get_store_policy<'a>(
    &'a self,
    store_code: &'a str,
  ) -> impl Future<Output = Result<Option<StorePolicy>, Self::Error>> + Send + 'a;

  fn list_stores(
    &self,
  ) -> impl Future<Output = Result<Vec<StoreProfile>, Self::Error>> + Send + '_;
}
