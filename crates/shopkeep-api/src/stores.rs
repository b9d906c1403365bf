//! Handlers for `/stores` endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Serialize;
use shopkeep_core::{
  policy::{StorePolicy, StoreProfile},
  review::Platform,
  store::ReviewStore,
};

use crate::error::ApiError;

/// Public projection of a store profile; credentials never leave the server.
#[derive(Debug, Serialize)]
pub struct StoreSummary {
  pub store_code:  String,
  pub platform:    Platform,
  pub native_code: String,
  pub policy:      StorePolicy,
}

impl From<StoreProfile> for StoreSummary {
  fn from(p: StoreProfile) -> Self {
    Self {
      store_code:  p.store_code,
      platform:    p.platform,
      native_code: p.native_code,
      policy:      p.policy,
    }
  }
}

/// `GET /stores`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<StoreSummary>>, ApiError>
where
  S: ReviewStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let stores = store
    .list_stores()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(stores.into_iter().map(StoreSummary::from).collect()))
}

/// `POST /stores` — create or replace a store profile.
pub async fn upsert<S>(
  State(store): State<Arc<S>>,
  Json(profile): Json<StoreProfile>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReviewStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .upsert_store(profile)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /stores/:code/policy`
pub async fn get_policy<S>(
  State(store): State<Arc<S>>,
  Path(code): Path<String>,
) -> Result<Json<StorePolicy>, ApiError>
where
  S: ReviewStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let policy = store
    .get_store_policy(&code)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("store {code} not found")))?;
  Ok(Json(policy))
}

/// `PUT /stores/:code/policy` — replace a store's policy, keeping its
/// identity and credentials.
pub async fn put_policy<S>(
  State(store): State<Arc<S>>,
  Path(code): Path<String>,
  Json(policy): Json<StorePolicy>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReviewStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut profile = store
    .get_store(&code)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("store {code} not found")))?;

  profile.policy = policy;
  store
    .upsert_store(profile)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(StatusCode::NO_CONTENT)
}
