//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, dates as ISO 8601, list-valued
//! fields and the store policy as compact JSON.

use chrono::{DateTime, NaiveDate, Utc};
use shopkeep_core::{
  lifecycle::ReplyStatus,
  policy::{StorePolicy, StoreProfile},
  review::{Platform, ReviewId, ReviewRecord},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String {
  d.format("%Y-%m-%d").to_string()
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Lists & policy ──────────────────────────────────────────────────────────

pub fn encode_items(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_items(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_policy(policy: &StorePolicy) -> Result<String> {
  Ok(serde_json::to_string(policy)?)
}

pub fn decode_policy(s: &str) -> Result<StorePolicy> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `reviews` row.
pub struct RawReview {
  pub review_id:           String,
  pub store_code:          String,
  pub platform:            String,
  pub reviewer_name:       String,
  pub rating:              Option<i64>,
  pub content:             String,
  pub ordered_items:       String,
  pub review_date:         String,
  pub delivery_feedback:   Option<String>,
  pub status:              String,
  pub reply_text:          Option<String>,
  pub quality_score:       Option<f64>,
  pub generation_attempts: i64,
  pub requeue_count:       i64,
  pub error_reason:        Option<String>,
  pub ingested_at:         String,
  pub updated_at:          String,
}

impl RawReview {
  /// Column list matching the field order above; keep the two in sync.
  pub const COLUMNS: &'static str = "review_id, store_code, platform, reviewer_name, \
     rating, content, ordered_items, review_date, delivery_feedback, \
     status, reply_text, quality_score, generation_attempts, requeue_count, \
     error_reason, ingested_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      review_id:           row.get(0)?,
      store_code:          row.get(1)?,
      platform:            row.get(2)?,
      reviewer_name:       row.get(3)?,
      rating:              row.get(4)?,
      content:             row.get(5)?,
      ordered_items:       row.get(6)?,
      review_date:         row.get(7)?,
      delivery_feedback:   row.get(8)?,
      status:              row.get(9)?,
      reply_text:          row.get(10)?,
      quality_score:       row.get(11)?,
      generation_attempts: row.get(12)?,
      requeue_count:       row.get(13)?,
      error_reason:        row.get(14)?,
      ingested_at:         row.get(15)?,
      updated_at:          row.get(16)?,
    })
  }

  pub fn into_record(self) -> Result<ReviewRecord> {
    Ok(ReviewRecord {
      review_id:           ReviewId::from_string(self.review_id),
      store_code:          self.store_code,
      platform:            Platform::parse(&self.platform)?,
      reviewer_name:       self.reviewer_name,
      rating:              self.rating.map(|r| r as u8),
      content:             self.content,
      ordered_items:       decode_items(&self.ordered_items)?,
      review_date:         decode_date(&self.review_date)?,
      delivery_feedback:   self.delivery_feedback,
      status:              ReplyStatus::parse(&self.status)?,
      reply_text:          self.reply_text,
      quality_score:       self.quality_score.map(|s| s as f32),
      generation_attempts: self.generation_attempts as u32,
      requeue_count:       self.requeue_count as u32,
      error_reason:        self.error_reason,
      ingested_at:         decode_dt(&self.ingested_at)?,
      updated_at:          decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `stores` row.
pub struct RawStore {
  pub store_code:  String,
  pub platform:    String,
  pub native_code: String,
  pub username:    String,
  pub password:    String,
  pub policy:      String,
}

impl RawStore {
  pub const COLUMNS: &'static str =
    "store_code, platform, native_code, username, password, policy";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      store_code:  row.get(0)?,
      platform:    row.get(1)?,
      native_code: row.get(2)?,
      username:    row.get(3)?,
      password:    row.get(4)?,
      policy:      row.get(5)?,
    })
  }

  pub fn into_profile(self) -> Result<StoreProfile> {
    Ok(StoreProfile {
      store_code:  self.store_code,
      platform:    Platform::parse(&self.platform)?,
      native_code: self.native_code,
      username:    self.username,
      password:    self.password,
      policy:      decode_policy(&self.policy)?,
    })
  }
}
