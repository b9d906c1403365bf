//! [`SqliteStore`] — the SQLite implementation of [`ReviewStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use shopkeep_core::{
  lifecycle::ReplyStatus,
  policy::{StorePolicy, StoreProfile},
  review::{NewReview, ReviewId, ReviewRecord},
  store::{Ingested, RequeueOutcome, ReviewQuery, ReviewStore, StatusUpdate},
};

use crate::{
  Error, Result,
  encode::{
    RawReview, RawStore, encode_date, encode_dt, encode_items, encode_policy,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A shopkeep review store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one review by the exact id string.
  async fn fetch_review(&self, id_str: String) -> Result<Option<ReviewRecord>> {
    let sql = format!(
      "SELECT {} FROM reviews WHERE review_id = ?1",
      RawReview::COLUMNS
    );

    let raw: Option<RawReview> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawReview::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReview::into_record).transpose()
  }
}

// ─── ReviewStore impl ────────────────────────────────────────────────────────

impl ReviewStore for SqliteStore {
  type Error = Error;

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn ingest(&self, input: NewReview) -> Result<Ingested> {
    input.validate()?;

    let now = Utc::now();
    let record = ReviewRecord {
      review_id: ReviewId::derive(input.platform, &input.store_code, &input.native_id),
      store_code: input.store_code,
      platform: input.platform,
      reviewer_name: input.reviewer_name,
      rating: input.rating,
      content: input.content,
      ordered_items: input.ordered_items,
      review_date: input.review_date,
      delivery_feedback: input.delivery_feedback,
      status: ReplyStatus::Pending,
      reply_text: None,
      quality_score: None,
      generation_attempts: 0,
      requeue_count: 0,
      error_reason: None,
      ingested_at: now,
      updated_at: now,
    };

    let id_str        = record.review_id.as_str().to_owned();
    let store_code    = record.store_code.clone();
    let platform      = record.platform.as_str().to_owned();
    let reviewer_name = record.reviewer_name.clone();
    let rating        = record.rating.map(i64::from);
    let content       = record.content.clone();
    let items_str     = encode_items(&record.ordered_items)?;
    let date_str      = encode_date(record.review_date);
    let delivery      = record.delivery_feedback.clone();
    let status_str    = record.status.as_str().to_owned();
    let now_str       = encode_dt(now);

    let inserted: usize = self
      .conn
      .call(move |conn| {
        // The deterministic primary key makes re-ingestion a no-op.
        Ok(conn.execute(
          "INSERT OR IGNORE INTO reviews (
             review_id, store_code, platform, reviewer_name, rating,
             content, ordered_items, review_date, delivery_feedback,
             status, generation_attempts, ingested_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?12)",
          rusqlite::params![
            id_str,
            store_code,
            platform,
            reviewer_name,
            rating,
            content,
            items_str,
            date_str,
            delivery,
            status_str,
            now_str,
            now_str,
          ],
        )?)
      })
      .await?;

    if inserted == 0 {
      Ok(Ingested::Duplicate(record.review_id))
    } else {
      Ok(Ingested::Inserted(record))
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_review<'a>(&'a self, id: &'a ReviewId) -> Result<Option<ReviewRecord>> {
    self.fetch_review(id.as_str().to_owned()).await
  }

  async fn list_reviews<'a>(&'a self, query: &'a ReviewQuery) -> Result<Vec<ReviewRecord>> {
    let store_code = query.store_code.clone();
    let status_str = query.status.map(|s| s.as_str().to_owned());
    let limit_val  = query.limit.unwrap_or(100) as i64;
    let offset_val = query.offset.unwrap_or(0) as i64;

    let sql = format!(
      "SELECT {} FROM reviews
        WHERE (?1 IS NULL OR store_code = ?1)
          AND (?2 IS NULL OR status = ?2)
        ORDER BY ingested_at DESC, review_id
        LIMIT ?3 OFFSET ?4",
      RawReview::COLUMNS
    );

    let raws: Vec<RawReview> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![store_code, status_str, limit_val, offset_val],
            RawReview::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReview::into_record).collect()
  }

  // ── Claiming ──────────────────────────────────────────────────────────────

  async fn claim_next_pending<'a>(&'a self, store_code: &'a str) -> Result<Option<ReviewRecord>> {
    let store_code = store_code.to_owned();
    let now_str    = encode_dt(Utc::now());

    // Single guarded UPDATE: two concurrent claimants cannot take the same
    // row because the inner status check re-runs under the write lock.
    let sql = format!(
      "UPDATE reviews
          SET status = 'generating', updated_at = ?2
        WHERE review_id = (
                SELECT review_id FROM reviews
                 WHERE store_code = ?1 AND status = 'pending'
                 ORDER BY ingested_at, review_id
                 LIMIT 1)
          AND status = 'pending'
        RETURNING {}",
      RawReview::COLUMNS
    );

    let raw: Option<RawReview> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![store_code, now_str], RawReview::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReview::into_record).transpose()
  }

  async fn release_claim<'a>(&'a self, id: &'a ReviewId) -> Result<bool> {
    let id_str  = id.as_str().to_owned();
    let now_str = encode_dt(Utc::now());

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE reviews
              SET status = 'pending', updated_at = ?2
            WHERE review_id = ?1
              AND status IN ('generating', 'quality_review', 'ready')",
          rusqlite::params![id_str, now_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  // ── Status transitions ────────────────────────────────────────────────────

  async fn update_status<'a>(
    &'a self,
    id:     &'a ReviewId,
    from:   ReplyStatus,
    to:     ReplyStatus,
    update: StatusUpdate,
  ) -> Result<bool> {
    // Illegal transitions never reach the database.
    if !from.can_transition_to(to) {
      return Ok(false);
    }

    let id_str   = id.as_str().to_owned();
    let from_str = from.as_str();
    let to_str   = to.as_str();
    let now_str  = encode_dt(Utc::now());

    let reply_text    = update.reply_text;
    let quality_score = update.quality_score.map(f64::from);
    let attempts      = update.generation_attempts.map(i64::from);
    let error_reason  = update.error_reason;

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE reviews
              SET status              = ?3,
                  updated_at          = ?4,
                  reply_text          = COALESCE(?5, reply_text),
                  quality_score       = COALESCE(?6, quality_score),
                  generation_attempts = COALESCE(?7, generation_attempts),
                  error_reason        = COALESCE(?8, error_reason)
            WHERE review_id = ?1 AND status = ?2",
          rusqlite::params![
            id_str,
            from_str,
            to_str,
            now_str,
            reply_text,
            quality_score,
            attempts,
            error_reason,
          ],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn requeue<'a>(&'a self, id: &'a ReviewId) -> Result<RequeueOutcome> {
    let Some(record) = self.fetch_review(id.as_str().to_owned()).await? else {
      return Ok(RequeueOutcome::NotEligible);
    };

    let id_str  = id.as_str().to_owned();
    let now_str = encode_dt(Utc::now());

    match record.status {
      // The explicit operator override: everything resets.
      ReplyStatus::ManualRequired => {
        let changed: usize = self
          .conn
          .call(move |conn| {
            Ok(conn.execute(
              "UPDATE reviews
                  SET status = 'pending',
                      generation_attempts = 0,
                      requeue_count = 0,
                      error_reason = NULL,
                      updated_at = ?2
                WHERE review_id = ?1 AND status = 'manual_required'",
              rusqlite::params![id_str, now_str],
            )?)
          })
          .await?;
        Ok(if changed > 0 { RequeueOutcome::Requeued } else { RequeueOutcome::NotEligible })
      }

      // The scheduler path: bounded by the store policy's ceiling. The
      // requeue_count guard makes the increment race-safe.
      ReplyStatus::Failed => {
        let max_requeues = self
          .get_store_policy(&record.store_code)
          .await?
          .map(|p| p.max_requeues)
          .unwrap_or_default();
        let count = record.requeue_count as i64;

        if record.requeue_count < max_requeues {
          let changed: usize = self
            .conn
            .call(move |conn| {
              Ok(conn.execute(
                "UPDATE reviews
                    SET status = 'pending',
                        generation_attempts = 0,
                        requeue_count = requeue_count + 1,
                        error_reason = NULL,
                        updated_at = ?2
                  WHERE review_id = ?1
                    AND status = 'failed'
                    AND requeue_count = ?3",
                rusqlite::params![id_str, now_str, count],
              )?)
            })
            .await?;
          Ok(if changed > 0 { RequeueOutcome::Requeued } else { RequeueOutcome::NotEligible })
        } else {
          let changed: usize = self
            .conn
            .call(move |conn| {
              Ok(conn.execute(
                "UPDATE reviews
                    SET status = 'manual_required',
                        updated_at = ?2
                  WHERE review_id = ?1 AND status = 'failed'",
                rusqlite::params![id_str, now_str],
              )?)
            })
            .await?;
          Ok(if changed > 0 { RequeueOutcome::Escalated } else { RequeueOutcome::NotEligible })
        }
      }

      _ => Ok(RequeueOutcome::NotEligible),
    }
  }

  // ── Stores & policy ───────────────────────────────────────────────────────

  async fn upsert_store(&self, profile: StoreProfile) -> Result<()> {
    let store_code  = profile.store_code.clone();
    let platform    = profile.platform.as_str().to_owned();
    let native_code = profile.native_code.clone();
    let username    = profile.username.clone();
    let password    = profile.password.clone();
    let policy_str  = encode_policy(&profile.policy)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO stores (store_code, platform, native_code, username, password, policy)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(store_code) DO UPDATE SET
             platform    = excluded.platform,
             native_code = excluded.native_code,
             username    = excluded.username,
             password    = excluded.password,
             policy      = excluded.policy",
          rusqlite::params![store_code, platform, native_code, username, password, policy_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_store<'a>(&'a self, store_code: &'a str) -> Result<Option<StoreProfile>> {
    let code = store_code.to_owned();
    let sql  = format!("SELECT {} FROM stores WHERE store_code = ?1", RawStore::COLUMNS);

    let raw: Option<RawStore> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![code], RawStore::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStore::into_profile).transpose()
  }

  async fn get_store_policy<'a>(&'a self, store_code: &'a str) -> Result<Option<StorePolicy>> {
    Ok(self.get_store(store_code).await?.map(|p| p.policy))
  }

  async fn list_stores(&self) -> Result<Vec<StoreProfile>> {
    let sql = format!("SELECT {} FROM stores ORDER BY store_code", RawStore::COLUMNS);

    let raws: Vec<RawStore> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawStore::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStore::into_profile).collect()
  }
}
