//! Review types — the unit of work the reply pipeline operates on.
//!
//! A review's facts (who wrote it, what it says) are immutable after
//! ingestion; only its processing state changes, and only along the
//! transitions in [`crate::lifecycle`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result, lifecycle::ReplyStatus};

// ─── Platform ────────────────────────────────────────────────────────────────

/// The storefront platforms a review can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
  Baemin,
  Yogiyo,
  CoupangEats,
  Naver,
}

impl Platform {
  /// The discriminant string stored in the `platform` column.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Baemin => "baemin",
      Self::Yogiyo => "yogiyo",
      Self::CoupangEats => "coupang_eats",
      Self::Naver => "naver",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "baemin" => Ok(Self::Baemin),
      "yogiyo" => Ok(Self::Yogiyo),
      "coupang_eats" => Ok(Self::CoupangEats),
      "naver" => Ok(Self::Naver),
      other => Err(Error::UnknownPlatform(other.to_string())),
    }
  }
}

impl std::fmt::Display for Platform {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Globally-unique review identity, derived deterministically from
/// platform + store + the platform's native review id.
///
/// Ingesting the same native review twice always derives the same id, which
/// is what makes ingestion idempotent — the store rejects the duplicate on
/// its primary key rather than relying on a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(String);

impl ReviewId {
  /// Derive the id as a SHA-256 digest over `platform:store_code:native_id`.
  pub fn derive(platform: Platform, store_code: &str, native_id: &str) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(platform.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(store_code.as_bytes());
    hasher.update(b":");
    hasher.update(native_id.as_bytes());
    Self(hex::encode(hasher.finalize()))
  }

  /// Wrap an id string read back from storage or a request path.
  pub fn from_string(s: String) -> Self {
    Self(s)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for ReviewId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ReviewStore::ingest`].
///
/// Carries no id and no status; the store derives the id and initialises the
/// record as [`ReplyStatus::Pending`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
  pub store_code:        String,
  pub platform:          Platform,
  /// The platform's own review identifier, as scraped.
  pub native_id:         String,
  pub reviewer_name:     String,
  /// 1..=5; platforms without ratings omit it.
  #[serde(default)]
  pub rating:            Option<u8>,
  /// May be empty — some platforms allow rating-only reviews.
  #[serde(default)]
  pub content:           String,
  #[serde(default)]
  pub ordered_items:     Vec<String>,
  pub review_date:       NaiveDate,
  #[serde(default)]
  pub delivery_feedback: Option<String>,
}

impl NewReview {
  /// Validate the rating range. Ratings are optional but never zero.
  pub fn validate(&self) -> Result<()> {
    if let Some(r) = self.rating
      && !(1..=5).contains(&r)
    {
      return Err(Error::RatingOutOfRange(r));
    }
    Ok(())
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// One customer review plus its reply-processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
  pub review_id:           ReviewId,
  pub store_code:          String,
  pub platform:            Platform,
  pub reviewer_name:       String,
  pub rating:              Option<u8>,
  pub content:             String,
  pub ordered_items:       Vec<String>,
  pub review_date:         NaiveDate,
  pub delivery_feedback:   Option<String>,

  pub status:              ReplyStatus,
  pub reply_text:          Option<String>,
  pub quality_score:       Option<f32>,
  pub generation_attempts: u32,
  /// Times this record has been re-queued out of `failed`.
  pub requeue_count:       u32,
  pub error_reason:        Option<String>,

  /// Server-assigned; never changes after ingestion.
  pub ingested_at:         DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn id_derivation_is_deterministic() {
    let a = ReviewId::derive(Platform::Baemin, "ST001", "98765");
    let b = ReviewId::derive(Platform::Baemin, "ST001", "98765");
    assert_eq!(a, b);
  }

  #[test]
  fn id_derivation_separates_platforms_and_stores() {
    let a = ReviewId::derive(Platform::Baemin, "ST001", "98765");
    let b = ReviewId::derive(Platform::Yogiyo, "ST001", "98765");
    let c = ReviewId::derive(Platform::Baemin, "ST002", "98765");
    assert_ne!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn platform_roundtrip() {
    for p in [
      Platform::Baemin,
      Platform::Yogiyo,
      Platform::CoupangEats,
      Platform::Naver,
    ] {
      assert_eq!(Platform::parse(p.as_str()).unwrap(), p);
    }
    assert!(Platform::parse("doordash").is_err());
  }
}
