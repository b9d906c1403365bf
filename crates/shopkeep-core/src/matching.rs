//! Locating a stored review inside a live, paginated platform rendering.
//!
//! Platforms expose no stable native identifier to the automation layer, so
//! a review is re-identified by a weighted combination of independently
//! optional signals. The scoring here is pure and deterministic; the engine
//! drives repeated rendering passes and feeds each pass through
//! [`Matcher::evaluate`].

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::review::ReviewRecord;

// ─── Candidate ───────────────────────────────────────────────────────────────

/// One rendered review element as currently observed on the platform page.
///
/// Transient: produced by a platform adapter during a single matching call
/// and never persisted. `element_id` is an opaque adapter-assigned handle
/// used to address the element again when submitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
  pub element_id:    String,
  pub reviewer_name: String,
  pub content:       String,
  pub rating:        Option<u8>,
  /// The platform's displayed relative date, e.g. "yesterday".
  pub relative_date: Option<String>,
  /// Menu/item text as rendered, usually a comma-joined line.
  pub items_text:    String,
}

// ─── Result ──────────────────────────────────────────────────────────────────

/// Outcome of scoring one pass of candidates against a target review.
/// Owned by the caller and discarded after use.
#[derive(Debug, Clone)]
pub struct MatchResult {
  /// The accepted candidate, or `None` if no candidate cleared the bar.
  pub candidate: Option<MatchCandidate>,
  /// The best score seen, whether or not it was accepted.
  pub score:     f32,
  /// Signal names that matched for the best candidate.
  pub reasons:   BTreeSet<String>,
}

impl MatchResult {
  pub fn found(&self) -> bool {
    self.candidate.is_some()
  }

  pub fn not_found() -> Self {
    Self { candidate: None, score: 0.0, reasons: BTreeSet::new() }
  }
}

// ─── Matcher ─────────────────────────────────────────────────────────────────

/// Signal weights. Content dominates because it is the least ambiguous
/// signal a platform renders.
const WEIGHT_NAME: f32 = 2.0;
const WEIGHT_CONTENT: f32 = 3.0;
const WEIGHT_RATING: f32 = 1.0;
const WEIGHT_DATE: f32 = 1.0;
const WEIGHT_ITEMS: f32 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
  /// Minimum combined score to accept a candidate.
  #[serde(default = "default_min_score")]
  pub min_score:         f32,
  /// Target content longer than this (whitespace stripped) must match on
  /// the content signal specifically; summed side signals are not enough.
  /// Prevents false positives on generic short reviews.
  #[serde(default = "default_short_content_len")]
  pub short_content_len: usize,
}

fn default_min_score() -> f32 {
  3.0
}

fn default_short_content_len() -> usize {
  10
}

impl Default for MatcherConfig {
  fn default() -> Self {
    Self {
      min_score:         default_min_score(),
      short_content_len: default_short_content_len(),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Matcher {
  config: MatcherConfig,
}

impl Matcher {
  pub fn new(config: MatcherConfig) -> Self {
    Self { config }
  }

  /// Score every candidate in scan order and return the best acceptable one.
  ///
  /// Deterministic: ties break to the first candidate encountered, which is
  /// stable because rendering passes are append-only.
  pub fn evaluate(
    &self,
    target:     &ReviewRecord,
    candidates: &[MatchCandidate],
    today:      NaiveDate,
  ) -> MatchResult {
    let mut best: Option<(usize, f32, BTreeSet<String>)> = None;

    for (idx, candidate) in candidates.iter().enumerate() {
      let (score, reasons) = self.score_candidate(target, candidate, today);

      let better = match &best {
        Some((_, best_score, _)) => score > *best_score,
        None => true,
      };
      if better {
        best = Some((idx, score, reasons));
      }
    }

    match best {
      Some((idx, score, reasons)) if self.acceptable(target, score, &reasons) => MatchResult {
        candidate: Some(candidates[idx].clone()),
        score,
        reasons,
      },
      Some((_, score, reasons)) => MatchResult { candidate: None, score, reasons },
      None => MatchResult::not_found(),
    }
  }

  fn acceptable(&self, target: &ReviewRecord, score: f32, reasons: &BTreeSet<String>) -> bool {
    if score < self.config.min_score {
      return false;
    }
    // Long target content must have matched on content itself.
    let content = strip_whitespace(&target.content);
    if content.chars().count() > self.config.short_content_len && !reasons.contains("content") {
      return false;
    }
    true
  }

  fn score_candidate(
    &self,
    target:    &ReviewRecord,
    candidate: &MatchCandidate,
    today:     NaiveDate,
  ) -> (f32, BTreeSet<String>) {
    let mut score = 0.0;
    let mut reasons = BTreeSet::new();

    // Reviewer name: exact containment in the candidate's name field.
    if !target.reviewer_name.is_empty()
      && candidate.reviewer_name.contains(&target.reviewer_name)
    {
      score += WEIGHT_NAME;
      reasons.insert("name".to_string());
    }

    // Content: whitespace-stripped containment. The strongest signal.
    let target_content = strip_whitespace(&target.content);
    if !target_content.is_empty()
      && strip_whitespace(&candidate.content).contains(&target_content)
    {
      score += WEIGHT_CONTENT;
      reasons.insert("content".to_string());
    }

    // Rating: equal star count, only when the target has one.
    if let (Some(t), Some(c)) = (target.rating, candidate.rating)
      && t == c
    {
      score += WEIGHT_RATING;
      reasons.insert("rating".to_string());
    }

    // Relative date: the target date rendered in the platform's
    // relative-date vocabulary must equal the displayed phrase.
    if let Some(displayed) = &candidate.relative_date
      && displayed.trim().to_lowercase() == relative_date_phrase(target.review_date, today)
    {
      score += WEIGHT_DATE;
      reasons.insert("date".to_string());
    }

    // Ordered items: any target item contained in the rendered item text.
    let candidate_items = strip_whitespace(&candidate.items_text);
    if target.ordered_items.iter().any(|item| {
      let item = strip_whitespace(item);
      !item.is_empty() && candidate_items.contains(&item)
    }) {
      score += WEIGHT_ITEMS;
      reasons.insert("items".to_string());
    }

    (score, reasons)
  }
}

// ─── Text normalisation ──────────────────────────────────────────────────────

/// Remove all whitespace. Rendered review text re-wraps arbitrarily, so
/// containment checks ignore spacing entirely.
pub fn strip_whitespace(s: &str) -> String {
  s.chars().filter(|c| !c.is_whitespace()).collect()
}

// ─── Relative dates ──────────────────────────────────────────────────────────

/// Render a review date in the relative-date vocabulary platforms display.
///
/// Dates in the future (clock skew between scrape and platform) clamp to
/// "today".
pub fn relative_date_phrase(date: NaiveDate, today: NaiveDate) -> String {
  let days = (today - date).num_days();
  match days {
    ..=0 => "today".to_string(),
    1 => "yesterday".to_string(),
    2..30 => format!("{days} days ago"),
    _ => format!("{} months ago", days / 30),
  }
}

/// Parse a displayed relative date back into a calendar date.
/// Used at ingestion time by adapters; unknown phrases fall back to today.
pub fn parse_relative_date(phrase: &str, today: NaiveDate) -> NaiveDate {
  let phrase = phrase.trim().to_lowercase();
  if phrase == "today" {
    return today;
  }
  if phrase == "yesterday" {
    return today - chrono::Days::new(1);
  }
  if let Some(n) = phrase
    .strip_suffix("days ago")
    .and_then(|s| s.trim().parse::<u64>().ok())
  {
    return today - chrono::Days::new(n);
  }
  if let Some(n) = phrase
    .strip_suffix("months ago")
    .and_then(|s| s.trim().parse::<u64>().ok())
  {
    return today - chrono::Days::new(n * 30);
  }
  today
}
