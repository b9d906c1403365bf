//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use shopkeep_core::{
  lifecycle::ReplyStatus,
  policy::{StorePolicy, StoreProfile},
  review::{NewReview, Platform},
  store::{Ingested, RequeueOutcome, ReviewQuery, ReviewStore, StatusUpdate},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  let s = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  s.upsert_store(profile("ST001")).await.unwrap();
  s.upsert_store(profile("ST002")).await.unwrap();
  s
}

fn profile(store_code: &str) -> StoreProfile {
  StoreProfile {
    store_code:  store_code.to_string(),
    platform:    Platform::Baemin,
    native_code: "1463897".to_string(),
    username:    "owner@example.com".to_string(),
    password:    "hunter2".to_string(),
    policy:      StorePolicy::default(),
  }
}

fn new_review(store_code: &str, native_id: &str) -> NewReview {
  NewReview {
    store_code:        store_code.to_string(),
    platform:          Platform::Baemin,
    native_id:         native_id.to_string(),
    reviewer_name:     "Kim".to_string(),
    rating:            Some(4),
    content:           "The noodles arrived hot and chewy".to_string(),
    ordered_items:     vec!["Jjajangmyeon".to_string()],
    review_date:       NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
    delivery_feedback: Some("fast".to_string()),
  }
}

// ─── Ingestion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_and_get() {
  let s = store().await;

  let Ingested::Inserted(record) = s.ingest(new_review("ST001", "r-1")).await.unwrap()
  else {
    panic!("expected insert");
  };
  assert_eq!(record.status, ReplyStatus::Pending);
  assert_eq!(record.generation_attempts, 0);

  let fetched = s.get_review(&record.review_id).await.unwrap().unwrap();
  assert_eq!(fetched.review_id, record.review_id);
  assert_eq!(fetched.reviewer_name, "Kim");
  assert_eq!(fetched.rating, Some(4));
  assert_eq!(fetched.ordered_items, vec!["Jjajangmyeon".to_string()]);
  assert_eq!(fetched.review_date, record.review_date);
  assert_eq!(fetched.status, ReplyStatus::Pending);
}

#[tokio::test]
async fn ingest_is_idempotent() {
  let s = store().await;

  let first = s.ingest(new_review("ST001", "r-1")).await.unwrap();
  assert!(first.is_inserted());

  // Same platform/store/native id, even with drifted scraped fields.
  let mut again = new_review("ST001", "r-1");
  again.content = "re-scraped with different truncation".to_string();
  let second = s.ingest(again).await.unwrap();
  assert!(matches!(second, Ingested::Duplicate(_)));

  let all = s.list_reviews(&ReviewQuery::default()).await.unwrap();
  assert_eq!(all.len(), 1);
  // The original scrape wins.
  assert_eq!(all[0].content, "The noodles arrived hot and chewy");
}

#[tokio::test]
async fn ingest_rejects_out_of_range_rating() {
  let s = store().await;
  let mut input = new_review("ST001", "r-1");
  input.rating = Some(6);
  assert!(s.ingest(input).await.is_err());
}

#[tokio::test]
async fn list_filters_by_store_and_status() {
  let s = store().await;
  s.ingest(new_review("ST001", "r-1")).await.unwrap();
  s.ingest(new_review("ST001", "r-2")).await.unwrap();
  s.ingest(new_review("ST002", "r-1")).await.unwrap();

  let st1 = s
    .list_reviews(&ReviewQuery {
      store_code: Some("ST001".to_string()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(st1.len(), 2);

  s.claim_next_pending("ST001").await.unwrap().unwrap();

  let pending = s
    .list_reviews(&ReviewQuery {
      store_code: Some("ST001".to_string()),
      status: Some(ReplyStatus::Pending),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);
}

// ─── Claiming ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn claim_takes_oldest_pending_and_marks_generating() {
  let s = store().await;
  let Ingested::Inserted(first) = s.ingest(new_review("ST001", "r-1")).await.unwrap()
  else {
    panic!()
  };
  s.ingest(new_review("ST001", "r-2")).await.unwrap();

  let claimed = s.claim_next_pending("ST001").await.unwrap().unwrap();
  assert_eq!(claimed.review_id, first.review_id);
  assert_eq!(claimed.status, ReplyStatus::Generating);

  let stored = s.get_review(&first.review_id).await.unwrap().unwrap();
  assert_eq!(stored.status, ReplyStatus::Generating);
}

#[tokio::test]
async fn claim_returns_none_when_nothing_pending() {
  let s = store().await;
  assert!(s.claim_next_pending("ST001").await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_claims_take_distinct_records() {
  let s = store().await;
  s.ingest(new_review("ST001", "r-1")).await.unwrap();

  let (a, b) = tokio::join!(s.claim_next_pending("ST001"), s.claim_next_pending("ST001"));
  let a = a.unwrap();
  let b = b.unwrap();

  // Exactly one claimant wins the single pending record.
  assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
}

#[tokio::test]
async fn release_claim_returns_record_to_pending() {
  let s = store().await;
  s.ingest(new_review("ST001", "r-1")).await.unwrap();
  let claimed = s.claim_next_pending("ST001").await.unwrap().unwrap();

  assert!(s.release_claim(&claimed.review_id).await.unwrap());
  let stored = s.get_review(&claimed.review_id).await.unwrap().unwrap();
  assert_eq!(stored.status, ReplyStatus::Pending);

  // And it is claimable again.
  assert!(s.claim_next_pending("ST001").await.unwrap().is_some());
}

// ─── Status transitions ──────────────────────────────────────────────────────

#[tokio::test]
async fn update_status_writes_fields_on_success() {
  let s = store().await;
  s.ingest(new_review("ST001", "r-1")).await.unwrap();
  let claimed = s.claim_next_pending("ST001").await.unwrap().unwrap();
  let id = claimed.review_id;

  let ok = s
    .update_status(
      &id,
      ReplyStatus::Generating,
      ReplyStatus::QualityReview,
      StatusUpdate {
        generation_attempts: Some(1),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert!(ok);

  let ok = s
    .update_status(
      &id,
      ReplyStatus::QualityReview,
      ReplyStatus::Ready,
      StatusUpdate {
        reply_text: Some("Thank you so much, Kim!".to_string()),
        quality_score: Some(0.9),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert!(ok);

  let stored = s.get_review(&id).await.unwrap().unwrap();
  assert_eq!(stored.status, ReplyStatus::Ready);
  assert_eq!(stored.reply_text.as_deref(), Some("Thank you so much, Kim!"));
  assert_eq!(stored.generation_attempts, 1);
  assert!((stored.quality_score.unwrap() - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn update_status_fails_on_stale_expectation() {
  let s = store().await;
  s.ingest(new_review("ST001", "r-1")).await.unwrap();
  let claimed = s.claim_next_pending("ST001").await.unwrap().unwrap();

  // Record is Generating, caller believes it is still Pending.
  let ok = s
    .update_status(
      &claimed.review_id,
      ReplyStatus::Pending,
      ReplyStatus::Generating,
      StatusUpdate::default(),
    )
    .await
    .unwrap();
  assert!(!ok);

  let stored = s.get_review(&claimed.review_id).await.unwrap().unwrap();
  assert_eq!(stored.status, ReplyStatus::Generating);
}

#[tokio::test]
async fn update_status_rejects_illegal_transitions() {
  let s = store().await;
  s.ingest(new_review("ST001", "r-1")).await.unwrap();
  let claimed = s.claim_next_pending("ST001").await.unwrap().unwrap();

  // Generating → Posted skips the gate and the posting step.
  let ok = s
    .update_status(
      &claimed.review_id,
      ReplyStatus::Generating,
      ReplyStatus::Posted,
      StatusUpdate::default(),
    )
    .await
    .unwrap();
  assert!(!ok);
}

// ─── Requeue ─────────────────────────────────────────────────────────────────

/// Claim the next pending review and walk it straight to `failed`.
async fn fail_once(s: &SqliteStore) -> shopkeep_core::review::ReviewId {
  let claimed = s.claim_next_pending("ST001").await.unwrap().unwrap();
  let id = claimed.review_id;
  assert!(
    s.update_status(
      &id,
      ReplyStatus::Generating,
      ReplyStatus::Failed,
      StatusUpdate {
        generation_attempts: Some(2),
        error_reason: Some("review_not_found".to_string()),
        ..Default::default()
      },
    )
    .await
    .unwrap()
  );
  id
}

#[tokio::test]
async fn requeue_resets_failed_records() {
  let s = store().await;
  s.ingest(new_review("ST001", "r-1")).await.unwrap();
  let id = fail_once(&s).await;

  assert_eq!(s.requeue(&id).await.unwrap(), RequeueOutcome::Requeued);
  let stored = s.get_review(&id).await.unwrap().unwrap();
  assert_eq!(stored.status, ReplyStatus::Pending);
  assert_eq!(stored.generation_attempts, 0);
  assert_eq!(stored.requeue_count, 1);
  assert!(stored.error_reason.is_none());
}

#[tokio::test]
async fn requeue_escalates_at_the_failure_ceiling() {
  let s = store().await;
  let mut p = profile("ST001");
  p.policy.max_requeues = 2;
  s.upsert_store(p).await.unwrap();

  s.ingest(new_review("ST001", "r-1")).await.unwrap();

  // Two fail/requeue cycles are allowed...
  let id = fail_once(&s).await;
  assert_eq!(s.requeue(&id).await.unwrap(), RequeueOutcome::Requeued);
  fail_once(&s).await;
  assert_eq!(s.requeue(&id).await.unwrap(), RequeueOutcome::Requeued);

  // ...the third failure escalates instead of requeueing.
  fail_once(&s).await;
  assert_eq!(s.requeue(&id).await.unwrap(), RequeueOutcome::Escalated);
  let stored = s.get_review(&id).await.unwrap().unwrap();
  assert_eq!(stored.status, ReplyStatus::ManualRequired);
}

#[tokio::test]
async fn operator_reset_clears_the_requeue_counter() {
  let s = store().await;
  let mut p = profile("ST001");
  p.policy.max_requeues = 1;
  s.upsert_store(p).await.unwrap();

  s.ingest(new_review("ST001", "r-1")).await.unwrap();
  let id = fail_once(&s).await;
  assert_eq!(s.requeue(&id).await.unwrap(), RequeueOutcome::Requeued);
  fail_once(&s).await;
  assert_eq!(s.requeue(&id).await.unwrap(), RequeueOutcome::Escalated);

  // The manual reset starts the cycle over.
  assert_eq!(s.requeue(&id).await.unwrap(), RequeueOutcome::Requeued);
  let stored = s.get_review(&id).await.unwrap().unwrap();
  assert_eq!(stored.status, ReplyStatus::Pending);
  assert_eq!(stored.requeue_count, 0);
}

#[tokio::test]
async fn requeue_does_not_touch_posted_records() {
  let s = store().await;
  s.ingest(new_review("ST001", "r-1")).await.unwrap();
  let claimed = s.claim_next_pending("ST001").await.unwrap().unwrap();
  let id = claimed.review_id;
  for (from, to) in [
    (ReplyStatus::Generating, ReplyStatus::QualityReview),
    (ReplyStatus::QualityReview, ReplyStatus::Ready),
    (ReplyStatus::Ready, ReplyStatus::Posting),
    (ReplyStatus::Posting, ReplyStatus::Posted),
  ] {
    assert!(s.update_status(&id, from, to, StatusUpdate::default()).await.unwrap());
  }

  assert_eq!(s.requeue(&id).await.unwrap(), RequeueOutcome::NotEligible);
  let stored = s.get_review(&id).await.unwrap().unwrap();
  assert_eq!(stored.status, ReplyStatus::Posted);
}

// ─── Stores & policy ─────────────────────────────────────────────────────────

#[tokio::test]
async fn store_profile_roundtrip() {
  let s = store().await;

  let mut p = profile("ST009");
  p.policy.banned_words = vec!["chef".to_string()];
  p.policy.max_regen = 5;
  p.policy.reply_by_rating = [false, true, true, true, true];
  s.upsert_store(p.clone()).await.unwrap();

  let fetched = s.get_store("ST009").await.unwrap().unwrap();
  assert_eq!(fetched.platform, Platform::Baemin);
  assert_eq!(fetched.native_code, "1463897");
  assert_eq!(fetched.policy.banned_words, vec!["chef".to_string()]);
  assert_eq!(fetched.policy.max_regen, 5);
  assert_eq!(fetched.policy.reply_by_rating, [false, true, true, true, true]);

  let policy = s.get_store_policy("ST009").await.unwrap().unwrap();
  assert_eq!(policy.max_regen, 5);
}

#[tokio::test]
async fn upsert_overwrites_existing_profile() {
  let s = store().await;

  let mut p = profile("ST001");
  p.username = "new-owner@example.com".to_string();
  s.upsert_store(p).await.unwrap();

  let fetched = s.get_store("ST001").await.unwrap().unwrap();
  assert_eq!(fetched.username, "new-owner@example.com");

  let all = s.list_stores().await.unwrap();
  assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn get_store_missing_returns_none() {
  let s = store().await;
  assert!(s.get_store("NOPE").await.unwrap().is_none());
  assert!(s.get_store_policy("NOPE").await.unwrap().is_none());
}
