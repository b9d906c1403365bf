//! Per-store configuration: reply policy, platform credentials, identity.
//!
//! Policy is consumed read-only by the matcher/gate/orchestrator; it is
//! authored through the API or CLI and stored alongside the store profile.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::review::Platform;

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Store-defined rules for generating and accepting replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorePolicy {
  /// Prepended to every reply if the model didn't already open with it.
  pub greeting_prefix:      Option<String>,
  /// Appended to every reply if the model didn't already close with it.
  pub greeting_suffix:      Option<String>,
  /// Who the model writes as, e.g. "the friendly owner of a snack bar".
  #[serde(default = "default_persona")]
  pub persona:              String,
  #[serde(default = "default_tone")]
  pub tone:                 String,

  /// Store-specific banned words; a global set applies on top of these.
  #[serde(default)]
  pub banned_words:         Vec<String>,
  #[serde(default = "default_min_length")]
  pub min_length:           usize,
  #[serde(default = "default_max_length")]
  pub max_length:           usize,

  /// Master switch for the automated pipeline on this store.
  #[serde(default = "default_true")]
  pub auto_reply_enabled:   bool,
  /// Per-rating enablement, index 0 = 1 star. Reviews without a rating are
  /// always eligible.
  #[serde(default = "default_reply_by_rating")]
  pub reply_by_rating:      [bool; 5],
  /// Local-time window outside which nothing is claimed for this store.
  pub reply_hours:          Option<ReplyHours>,

  #[serde(default = "default_acceptance_threshold")]
  pub acceptance_threshold: f32,
  /// Generation + gate cycles before escalating to manual handling.
  #[serde(default = "default_max_regen")]
  pub max_regen:            u32,
  /// Times a `failed` record may be re-queued before it escalates to
  /// `manual_required`.
  #[serde(default = "default_max_requeues")]
  pub max_requeues:         u32,

  /// At least one must appear in every reply (honorifics and the like).
  #[serde(default)]
  pub required_phrases:     Vec<String>,
  /// One must appear whenever the rating is at or below
  /// `low_rating_threshold`.
  #[serde(default = "default_apology_phrases")]
  pub apology_phrases:      Vec<String>,
  /// Known low-effort boilerplate; penalised when pasted under a long,
  /// detailed review.
  #[serde(default)]
  pub generic_templates:    Vec<String>,
  #[serde(default = "default_low_rating_threshold")]
  pub low_rating_threshold: u8,
}

fn default_persona() -> String {
  "the friendly store owner".to_string()
}

fn default_tone() -> String {
  "warm, professional, and personal".to_string()
}

fn default_min_length() -> usize {
  20
}

fn default_max_length() -> usize {
  300
}

fn default_true() -> bool {
  true
}

fn default_reply_by_rating() -> [bool; 5] {
  [true; 5]
}

fn default_acceptance_threshold() -> f32 {
  0.5
}

fn default_max_regen() -> u32 {
  3
}

fn default_max_requeues() -> u32 {
  3
}

fn default_apology_phrases() -> Vec<String> {
  vec!["sorry".to_string(), "apologize".to_string(), "apologise".to_string()]
}

fn default_low_rating_threshold() -> u8 {
  2
}

impl Default for StorePolicy {
  fn default() -> Self {
    Self {
      greeting_prefix:      None,
      greeting_suffix:      None,
      persona:              default_persona(),
      tone:                 default_tone(),
      banned_words:         Vec::new(),
      min_length:           default_min_length(),
      max_length:           default_max_length(),
      auto_reply_enabled:   default_true(),
      reply_by_rating:      default_reply_by_rating(),
      reply_hours:          None,
      acceptance_threshold: default_acceptance_threshold(),
      max_regen:            default_max_regen(),
      max_requeues:         default_max_requeues(),
      required_phrases:     Vec::new(),
      apology_phrases:      default_apology_phrases(),
      generic_templates:    Vec::new(),
      low_rating_threshold: default_low_rating_threshold(),
    }
  }
}

impl StorePolicy {
  /// Whether the automated pipeline may reply to a review with this rating.
  pub fn allows_rating(&self, rating: Option<u8>) -> bool {
    if !self.auto_reply_enabled {
      return false;
    }
    match rating {
      Some(r @ 1..=5) => self.reply_by_rating[(r - 1) as usize],
      // Out-of-range ratings never reach here (rejected at ingestion);
      // ratingless reviews are always eligible.
      _ => true,
    }
  }
}

// ─── Operating hours ─────────────────────────────────────────────────────────

/// A daily local-time window, inclusive on both ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReplyHours {
  pub start: NaiveTime,
  pub end:   NaiveTime,
}

impl ReplyHours {
  pub fn contains(&self, t: NaiveTime) -> bool {
    self.start <= t && t <= self.end
  }
}

// ─── Store profile ───────────────────────────────────────────────────────────

/// A store's identity on one platform plus its credentials and policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreProfile {
  pub store_code:  String,
  pub platform:    Platform,
  /// The platform's own identifier for this store (used for navigation).
  pub native_code: String,
  pub username:    String,
  pub password:    String,
  #[serde(default)]
  pub policy:      StorePolicy,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rating_flags_gate_eligibility() {
    let mut policy = StorePolicy::default();
    policy.reply_by_rating = [false, false, true, true, true];

    assert!(!policy.allows_rating(Some(1)));
    assert!(!policy.allows_rating(Some(2)));
    assert!(policy.allows_rating(Some(3)));
    assert!(policy.allows_rating(Some(5)));
    assert!(policy.allows_rating(None));
  }

  #[test]
  fn master_switch_overrides_rating_flags() {
    let mut policy = StorePolicy::default();
    policy.auto_reply_enabled = false;
    assert!(!policy.allows_rating(Some(5)));
    assert!(!policy.allows_rating(None));
  }

  #[test]
  fn reply_hours_window_is_inclusive() {
    let hours = ReplyHours {
      start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
      end:   NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
    };
    assert!(hours.contains(NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
    assert!(hours.contains(NaiveTime::from_hms_opt(15, 30, 0).unwrap()));
    assert!(hours.contains(NaiveTime::from_hms_opt(20, 0, 0).unwrap()));
    assert!(!hours.contains(NaiveTime::from_hms_opt(21, 0, 0).unwrap()));
  }
}
