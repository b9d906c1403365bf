//! Handlers for `/reviews` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/reviews` | optional `store_code`, `status`, `limit`, `offset` |
//! | `GET`  | `/reviews/:id` | Single review record |
//! | `POST` | `/reviews` | Body: [`NewReview`]; `201` inserted, `200` duplicate |
//! | `POST` | `/reviews/:id/requeue` | External reset for `failed` / `manual_required` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use shopkeep_core::{
  lifecycle::ReplyStatus,
  review::{NewReview, ReviewId, ReviewRecord},
  store::{Ingested, RequeueOutcome, ReviewQuery, ReviewStore},
};

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub store_code: Option<String>,
  /// A status discriminant, e.g. `"pending"` or `"manual_required"`.
  pub status:     Option<String>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

/// `GET /reviews[?store_code=...][&status=...][&limit=...][&offset=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ReviewRecord>>, ApiError>
where
  S: ReviewStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let status = params
    .status
    .as_deref()
    .map(ReplyStatus::parse)
    .transpose()
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let query = ReviewQuery {
    store_code: params.store_code,
    status,
    limit: params.limit,
    offset: params.offset,
  };

  let reviews = store
    .list_reviews(&query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(reviews))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /reviews/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<ReviewRecord>, ApiError>
where
  S: ReviewStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let id = ReviewId::from_string(id);
  let review = store
    .get_review(&id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("review {id} not found")))?;
  Ok(Json(review))
}

// ─── Ingest ───────────────────────────────────────────────────────────────────

/// `POST /reviews` — idempotent ingestion.
///
/// Returns `201` with the stored record on first sight, `200` with the
/// existing id when the same native review was already ingested.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewReview>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReviewStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let outcome = store
    .ingest(body)
    .await
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  Ok(match outcome {
    Ingested::Inserted(record) => (StatusCode::CREATED, Json(json!(record))),
    Ingested::Duplicate(id) => (
      StatusCode::OK,
      Json(json!({ "review_id": id, "duplicate": true })),
    ),
  })
}

// ─── Requeue ──────────────────────────────────────────────────────────────────

/// `POST /reviews/:id/requeue` — the operator workflow that re-arms a
/// `failed` or `manual_required` record for another automated attempt.
///
/// Returns the refreshed record; a `failed` record past its requeue
/// ceiling comes back as `manual_required` rather than `pending`.
pub async fn requeue_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<ReviewRecord>, ApiError>
where
  S: ReviewStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let id = ReviewId::from_string(id);

  let existing = store
    .get_review(&id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("review {id} not found")))?;

  let outcome = store
    .requeue(&id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if outcome == RequeueOutcome::NotEligible {
    return Err(ApiError::Conflict(format!(
      "review {id} is {} and cannot be requeued",
      existing.status
    )));
  }

  let refreshed = store
    .get_review(&id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("review {id} not found")))?;
  Ok(Json(refreshed))
}
