//! The reply lifecycle state machine.
//!
//! A review's status only ever moves along the transitions declared here.
//! `Posted` and `ManualRequired` are terminal: the automated pipeline never
//! leaves them. Re-arming a terminal record is an explicit external reset
//! (`ReviewStore::requeue`), not a state-machine transition.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Processing state of a review's reply.
///
/// ```text
/// pending → generating → quality_review → ready → posting → posted
///              ↑              │    │                  │
///              └─ regenerate ─┘    └→ manual_required └→ failed → pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
  Pending,
  Generating,
  QualityReview,
  Ready,
  Posting,
  Posted,
  Failed,
  ManualRequired,
}

impl ReplyStatus {
  /// The discriminant string stored in the `status` column.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Generating => "generating",
      Self::QualityReview => "quality_review",
      Self::Ready => "ready",
      Self::Posting => "posting",
      Self::Posted => "posted",
      Self::Failed => "failed",
      Self::ManualRequired => "manual_required",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "generating" => Ok(Self::Generating),
      "quality_review" => Ok(Self::QualityReview),
      "ready" => Ok(Self::Ready),
      "posting" => Ok(Self::Posting),
      "posted" => Ok(Self::Posted),
      "failed" => Ok(Self::Failed),
      "manual_required" => Ok(Self::ManualRequired),
      other => Err(Error::UnknownStatus(other.to_string())),
    }
  }

  /// A status the automated pipeline never self-transitions out of.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Posted | Self::ManualRequired)
  }

  /// Whether the pipeline may move a record from `self` to `next`.
  ///
  /// `Generating`/`QualityReview`/`Ready` back to `Pending` is the
  /// claim-release path taken on cooperative cancellation; `Failed` back to
  /// `Pending` is the external re-queue. Everything terminal returns false.
  pub fn can_transition_to(&self, next: ReplyStatus) -> bool {
    use ReplyStatus::*;
    match (self, next) {
      (Pending, Generating) => true,
      (Generating, QualityReview) => true,
      (QualityReview, Ready) => true,
      (QualityReview, Generating) => true,
      (QualityReview, ManualRequired) => true,
      (Ready, Posting) => true,
      (Posting, Posted) => true,
      (Posting, Failed) => true,
      (Posting, ManualRequired) => true,
      (Failed, Pending) => true,
      // Claim release on cancellation.
      (Generating | QualityReview | Ready, Pending) => true,
      // Rating-disabled and other pre-flight escalations.
      (Generating, ManualRequired) => true,
      (Generating, Failed) => true,
      _ => false,
    }
  }
}

impl std::fmt::Display for ReplyStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}
