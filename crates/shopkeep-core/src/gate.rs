//! The reply quality gate.
//!
//! Every generated reply passes through [`QualityGate::evaluate`] before it
//! may be submitted. Quality is a graded score (kept for logging and policy
//! tuning) but acceptance is a threshold decision, and a set of hard-fail
//! conditions reject regardless of score.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{matching::strip_whitespace, policy::StorePolicy, review::ReviewRecord};

// ─── Verdict ─────────────────────────────────────────────────────────────────

/// Result of gating one reply attempt.
#[derive(Debug, Clone)]
pub struct GateVerdict {
  pub accepted: bool,
  pub score:    f32,
  /// Machine-readable rejection/penalty codes, e.g. `"too_long"`,
  /// `"banned_word:worst"`.
  pub reasons:  BTreeSet<String>,
}

/// One generation + gate cycle, kept only long enough to decide between
/// retrying and escalating. The accepted attempt's text becomes the
/// record's `reply_text`.
#[derive(Debug, Clone)]
pub struct ReplyAttempt {
  pub text:              String,
  pub quality_score:     f32,
  pub accepted:          bool,
  pub rejection_reasons: BTreeSet<String>,
}

impl ReplyAttempt {
  pub fn from_verdict(text: String, verdict: &GateVerdict) -> Self {
    Self {
      text,
      quality_score: verdict.score,
      accepted: verdict.accepted,
      rejection_reasons: verdict.reasons.clone(),
    }
  }
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
  /// Banned regardless of store policy.
  #[serde(default = "default_global_banned_words")]
  pub global_banned_words:  Vec<String>,
  /// Extra characters tolerated past `policy.max_length` before the
  /// over-length penalty applies.
  #[serde(default)]
  pub length_slack:         usize,
  /// Review content longer than this counts as detailed feedback, for the
  /// generic-template check.
  #[serde(default = "default_detailed_content_len")]
  pub detailed_content_len: usize,
}

fn default_global_banned_words() -> Vec<String> {
  ["awful", "disgusting", "garbage", "worst"]
    .map(str::to_string)
    .to_vec()
}

fn default_detailed_content_len() -> usize {
  80
}

impl Default for GateConfig {
  fn default() -> Self {
    Self {
      global_banned_words:  default_global_banned_words(),
      length_slack:         0,
      detailed_content_len: default_detailed_content_len(),
    }
  }
}

// ─── Gate ────────────────────────────────────────────────────────────────────

const PENALTY_TOO_SHORT: f32 = 0.3;
const PENALTY_TOO_LONG: f32 = 0.2;
const PENALTY_MISSING_PHRASE: f32 = 0.1;
const PENALTY_MISSING_APOLOGY: f32 = 0.2;
const PENALTY_GENERIC: f32 = 0.2;

#[derive(Debug, Clone, Default)]
pub struct QualityGate {
  config: GateConfig,
}

impl QualityGate {
  pub fn new(config: GateConfig) -> Self {
    Self { config }
  }

  /// Evaluate a candidate reply against store policy and review context.
  ///
  /// Each check subtracts from a base score of 1.0; hard-fail conditions
  /// reject outright. `accepted` requires clearing the policy's acceptance
  /// threshold *and* tripping no hard fail.
  pub fn evaluate(
    &self,
    text:   &str,
    review: &ReviewRecord,
    policy: &StorePolicy,
  ) -> GateVerdict {
    let mut score: f32 = 1.0;
    let mut hard_fail = false;
    let mut reasons = BTreeSet::new();

    let trimmed = text.trim();
    if trimmed.is_empty() {
      reasons.insert("empty".to_string());
      return GateVerdict { accepted: false, score: 0.0, reasons };
    }

    let lower = trimmed.to_lowercase();
    let len = trimmed.chars().count();

    // Length band. Too short forces regeneration outright; too long is a
    // graded penalty only.
    if len < policy.min_length {
      score -= PENALTY_TOO_SHORT;
      hard_fail = true;
      reasons.insert("too_short".to_string());
    } else if len > policy.max_length + self.config.length_slack {
      score -= PENALTY_TOO_LONG;
      reasons.insert("too_long".to_string());
    }

    // Required phrases (honorifics and the like): at least one must appear.
    if !policy.required_phrases.is_empty()
      && !policy
        .required_phrases
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()))
    {
      score -= PENALTY_MISSING_PHRASE;
      reasons.insert("missing_required_phrase".to_string());
    }

    // A low rating never gets a reply without an apology.
    if let Some(rating) = review.rating
      && rating <= policy.low_rating_threshold
      && !policy
        .apology_phrases
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()))
    {
      score -= PENALTY_MISSING_APOLOGY;
      hard_fail = true;
      reasons.insert("missing_apology".to_string());
    }

    // Banned words, store-specific and global, zero the score.
    for word in policy
      .banned_words
      .iter()
      .chain(self.config.global_banned_words.iter())
    {
      if !word.is_empty() && lower.contains(&word.to_lowercase()) {
        reasons.insert(format!("banned_word:{word}"));
        return GateVerdict { accepted: false, score: 0.0, reasons };
      }
    }

    // A known boilerplate reply pasted under detailed feedback is lazy.
    let detailed =
      strip_whitespace(&review.content).chars().count() > self.config.detailed_content_len;
    if detailed
      && policy
        .generic_templates
        .iter()
        .any(|t| strip_whitespace(t).eq_ignore_ascii_case(&strip_whitespace(trimmed)))
    {
      score -= PENALTY_GENERIC;
      reasons.insert("generic_reply".to_string());
    }

    let score = score.max(0.0);
    GateVerdict {
      accepted: !hard_fail && score >= policy.acceptance_threshold,
      score,
      reasons,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, NaiveDate, Utc};

  use super::*;
  use crate::{lifecycle::ReplyStatus, review::{Platform, ReviewId, ReviewRecord}};

  fn review(rating: Option<u8>, content: &str) -> ReviewRecord {
    let ts: DateTime<Utc> = "2026-03-02T09:00:00Z".parse().unwrap();
    ReviewRecord {
      review_id:           ReviewId::derive(Platform::Baemin, "ST001", "native-1"),
      store_code:          "ST001".to_string(),
      platform:            Platform::Baemin,
      reviewer_name:       "Kim".to_string(),
      rating,
      content:             content.to_string(),
      ordered_items:       vec![],
      review_date:         NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
      delivery_feedback:   None,
      status:              ReplyStatus::QualityReview,
      reply_text:          None,
      quality_score:       None,
      generation_attempts: 0,
      requeue_count:       0,
      error_reason:        None,
      ingested_at:         ts,
      updated_at:          ts,
    }
  }

  fn policy() -> StorePolicy {
    StorePolicy::default()
  }

  #[test]
  fn empty_reply_scores_zero() {
    let gate = QualityGate::default();
    let verdict = gate.evaluate("   \n ", &review(Some(5), "nice"), &policy());
    assert!(!verdict.accepted);
    assert_eq!(verdict.score, 0.0);
    assert!(verdict.reasons.contains("empty"));
  }

  #[test]
  fn too_short_hard_fails() {
    let gate = QualityGate::default();
    let verdict = gate.evaluate("Thanks!", &review(Some(5), "nice"), &policy());
    assert!(!verdict.accepted);
    assert!(verdict.reasons.contains("too_short"));
  }

  #[test]
  fn over_length_penalises_but_still_accepts() {
    // A 310-character reply against max_length 300: −0.2, score 0.8,
    // accepted because length alone never hard-fails.
    let gate = QualityGate::default();
    let mut p = policy();
    p.max_length = 300;

    let text = format!("We are so sorry about your experience. {}", "x".repeat(271));
    assert_eq!(text.chars().count(), 310);

    let verdict = gate.evaluate(&text, &review(Some(1), "cold food"), &p);
    assert!(verdict.reasons.contains("too_long"));
    assert!((verdict.score - 0.8).abs() < 1e-6);
    assert!(verdict.accepted);
  }

  #[test]
  fn low_rating_without_apology_always_rejects() {
    let gate = QualityGate::default();
    let text = "Thank you so much for your kind words, we hope to see you again soon!";
    let verdict = gate.evaluate(text, &review(Some(1), "terrible delivery"), &policy());
    assert!(!verdict.accepted);
    assert!(verdict.reasons.contains("missing_apology"));

    // Same text sails through for a five-star review.
    let verdict = gate.evaluate(text, &review(Some(5), "great"), &policy());
    assert!(verdict.accepted);
  }

  #[test]
  fn banned_word_zeroes_the_score() {
    let gate = QualityGate::default();
    let text = "We are sorry the garbage bag got mixed into your order somehow.";
    let verdict = gate.evaluate(text, &review(Some(1), "found trash"), &policy());
    assert!(!verdict.accepted);
    assert_eq!(verdict.score, 0.0);
    assert!(verdict.reasons.iter().any(|r| r.starts_with("banned_word:")));
  }

  #[test]
  fn store_banned_words_apply_too() {
    let gate = QualityGate::default();
    let mut p = policy();
    p.banned_words = vec!["restaurant".to_string()];

    let verdict = gate.evaluate(
      "Thank you for visiting our restaurant, we appreciate it a lot!",
      &review(Some(4), "good"),
      &p,
    );
    assert_eq!(verdict.score, 0.0);
  }

  #[test]
  fn missing_required_phrase_is_a_penalty_not_a_fail() {
    let gate = QualityGate::default();
    let mut p = policy();
    p.required_phrases = vec!["dear customer".to_string()];

    let verdict = gate.evaluate(
      "Thank you so much for the lovely review, see you again soon!",
      &review(Some(5), "good"),
      &p,
    );
    assert!(verdict.reasons.contains("missing_required_phrase"));
    assert!((verdict.score - 0.9).abs() < 1e-6);
    assert!(verdict.accepted);
  }

  #[test]
  fn generic_template_under_detailed_review_is_penalised() {
    let gate = QualityGate::default();
    let mut p = policy();
    let boilerplate = "Thank you for your order, we hope you enjoyed the meal!";
    p.generic_templates = vec![boilerplate.to_string()];

    let detailed = "The jjajangmyeon was perfectly chewy but the tangsuyuk sauce \
                    arrived separately which kept everything crisp, really thoughtful \
                    packaging all around.";
    let verdict = gate.evaluate(boilerplate, &review(Some(5), detailed), &p);
    assert!(verdict.reasons.contains("generic_reply"));
    assert!((verdict.score - 0.8).abs() < 1e-6);

    // The same boilerplate is fine under a short review.
    let verdict = gate.evaluate(boilerplate, &review(Some(5), "good"), &p);
    assert!(verdict.accepted);
    assert!(!verdict.reasons.contains("generic_reply"));
  }

  #[test]
  fn threshold_decides_between_graded_penalties() {
    let gate = QualityGate::default();
    let mut p = policy();
    p.max_length = 40;
    p.required_phrases = vec!["dear customer".to_string()];
    p.acceptance_threshold = 0.75;

    // too_long (−0.2) + missing phrase (−0.1) = 0.7 < 0.75.
    let verdict = gate.evaluate(
      "Thanks a lot for this really kind review, come back soon!",
      &review(Some(5), "good"),
      &p,
    );
    assert!(!verdict.accepted);
    assert!((verdict.score - 0.7).abs() < 1e-6);
  }
}
