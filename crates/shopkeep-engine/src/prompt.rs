//! Prompt construction for the text-generation gateway.
//!
//! The gateway receives fully-rendered prompts; everything the model needs
//! to know about the store's voice and the review lives here.

use shopkeep_core::{
  generate::GenerationRequest,
  policy::StorePolicy,
  review::ReviewRecord,
};

/// Default sampling temperature; slight variation keeps regenerated
/// attempts from repeating a rejected reply verbatim.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

pub fn build_request(review: &ReviewRecord, policy: &StorePolicy, max_tokens: u32) -> GenerationRequest {
  GenerationRequest {
    system_prompt: system_prompt(policy),
    user_prompt:   user_prompt(review, policy),
    temperature:   DEFAULT_TEMPERATURE,
    max_tokens,
  }
}

pub fn system_prompt(policy: &StorePolicy) -> String {
  format!(
    "You are {persona}, replying to customer reviews of your store.\n\
     Write in a {tone} voice.\n\
     Rules you must always follow:\n\
     1. Address the customer by the name they reviewed under.\n\
     2. Thank them for the specific things they mentioned; never reply with \
     boilerplate that ignores the review.\n\
     3. Match your register to the rating: delight for 5 stars, gratitude \
     with a promise to keep improving for 3-4, and a sincere apology with a \
     concrete improvement for 2 or below.\n\
     4. No emoji.\n\
     5. Write plain text only, no markup.",
    persona = policy.persona,
    tone = policy.tone,
  )
}

pub fn user_prompt(review: &ReviewRecord, policy: &StorePolicy) -> String {
  let mut prompt = format!(
    "Write a reply to this review.\n\nCustomer: {name}\n",
    name = review.reviewer_name
  );

  if let Some(rating) = review.rating {
    prompt.push_str(&format!("Rating: {rating}/5\n"));
  }
  if !review.ordered_items.is_empty() {
    prompt.push_str(&format!("Ordered: {}\n", review.ordered_items.join(", ")));
  }
  if !review.content.trim().is_empty() {
    prompt.push_str(&format!("Review: {}\n", review.content.trim()));
  }
  if let Some(delivery) = review.delivery_feedback.as_deref().filter(|d| !d.trim().is_empty()) {
    prompt.push_str(&format!("Delivery feedback: {}\n", delivery.trim()));
  }

  prompt.push_str(&format!(
    "\nKeep the reply under {} characters.",
    policy.max_length
  ));

  match review.rating {
    Some(r) if r <= policy.low_rating_threshold => prompt.push_str(
      " Open with a sincere apology and name one concrete thing the store \
       will do better.",
    ),
    Some(3) => {
      prompt.push_str(" Thank them and acknowledge what fell short.");
    }
    _ => {}
  }

  prompt
}

/// Wrap the generated body in the store's greeting prefix/suffix, unless the
/// model already produced them.
pub fn apply_greetings(text: &str, policy: &StorePolicy) -> String {
  let mut reply = text.trim().to_string();

  if let Some(prefix) = policy.greeting_prefix.as_deref().filter(|p| !p.is_empty())
    && !reply.starts_with(prefix)
  {
    reply = format!("{prefix} {reply}");
  }
  if let Some(suffix) = policy.greeting_suffix.as_deref().filter(|s| !s.is_empty())
    && !reply.ends_with(suffix)
  {
    reply = format!("{reply} {suffix}");
  }

  reply
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, NaiveDate, Utc};
  use shopkeep_core::{
    lifecycle::ReplyStatus,
    policy::StorePolicy,
    review::{Platform, ReviewId, ReviewRecord},
  };

  use super::*;

  fn review(rating: Option<u8>) -> ReviewRecord {
    let ts: DateTime<Utc> = "2026-03-02T09:00:00Z".parse().unwrap();
    ReviewRecord {
      review_id:           ReviewId::derive(Platform::Baemin, "ST001", "r-1"),
      store_code:          "ST001".to_string(),
      platform:            Platform::Baemin,
      reviewer_name:       "Kim".to_string(),
      rating,
      content:             "Noodles were cold".to_string(),
      ordered_items:       vec!["Jjajangmyeon".to_string()],
      review_date:         NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
      delivery_feedback:   None,
      status:              ReplyStatus::Generating,
      reply_text:          None,
      quality_score:       None,
      generation_attempts: 0,
      requeue_count:       0,
      error_reason:        None,
      ingested_at:         ts,
      updated_at:          ts,
    }
  }

  #[test]
  fn user_prompt_carries_the_review_facts() {
    let prompt = user_prompt(&review(Some(2)), &StorePolicy::default());
    assert!(prompt.contains("Kim"));
    assert!(prompt.contains("2/5"));
    assert!(prompt.contains("Jjajangmyeon"));
    assert!(prompt.contains("Noodles were cold"));
    assert!(prompt.contains("apology"));
  }

  #[test]
  fn ratingless_reviews_omit_the_rating_line() {
    let prompt = user_prompt(&review(None), &StorePolicy::default());
    assert!(!prompt.contains("Rating:"));
  }

  #[test]
  fn greetings_wrap_only_when_missing() {
    let mut policy = StorePolicy::default();
    policy.greeting_prefix = Some("Hello!".to_string());
    policy.greeting_suffix = Some("Thank you.".to_string());

    let wrapped = apply_greetings("glad you enjoyed it.", &policy);
    assert!(wrapped.starts_with("Hello! "));
    assert!(wrapped.ends_with(" Thank you."));

    let already = apply_greetings("Hello! glad you enjoyed it. Thank you.", &policy);
    assert_eq!(already, "Hello! glad you enjoyed it. Thank you.");
  }
}
