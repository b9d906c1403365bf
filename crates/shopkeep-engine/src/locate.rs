//! Driving the matcher over a live, paginated candidate rendering.
//!
//! One "pass" is whatever the adapter currently renders; between passes the
//! adapter extends the rendering (scroll/pagination). Element discovery is
//! flaky, so each pass runs under the retry layer.

use chrono::NaiveDate;

use shopkeep_core::{
  adapter::{AdapterError, PlatformAdapter},
  matching::{MatchResult, Matcher},
  review::ReviewRecord,
};

use crate::retry::{RetryPolicy, retry};

/// Scan up to `max_scan_passes` renderings for `target`.
///
/// Returns the first accepted match, or the last pass's (not-found) result
/// once passes are exhausted. Errors only when a pass itself failed past its
/// retry budget.
pub async fn locate_review(
  adapter:         &mut dyn PlatformAdapter,
  matcher:         &Matcher,
  target:          &ReviewRecord,
  today:           NaiveDate,
  max_scan_passes: u32,
  retry_policy:    &RetryPolicy,
) -> Result<MatchResult, AdapterError> {
  let mut last = MatchResult::not_found();

  for pass in 1..=max_scan_passes {
    let adapter_ref = &mut *adapter;
    let candidates = retry(retry_policy, "render_candidates", async move || {
      adapter_ref.render_candidates().await
    })
    .await?;

    let result = matcher.evaluate(target, &candidates, today);
    tracing::debug!(
      review_id = %target.review_id,
      pass,
      candidates = candidates.len(),
      score = result.score,
      found = result.found(),
      "matching pass complete"
    );

    if result.found() {
      return Ok(result);
    }
    last = result;
  }

  tracing::info!(
    review_id = %target.review_id,
    passes = max_scan_passes,
    best_score = last.score,
    "review not found in rendered candidates"
  );
  Ok(last)
}
