//! JSON REST API for shopkeep.
//!
//! Exposes an axum [`Router`] backed by any
//! [`shopkeep_core::store::ReviewStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", shopkeep_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod reviews;
pub mod stores;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use shopkeep_core::store::ReviewStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ReviewStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Reviews
    .route("/reviews", get(reviews::list::<S>).post(reviews::create::<S>))
    .route("/reviews/{id}", get(reviews::get_one::<S>))
    .route("/reviews/{id}/requeue", post(reviews::requeue_one::<S>))
    // Stores
    .route("/stores", get(stores::list::<S>).post(stores::upsert::<S>))
    .route(
      "/stores/{code}/policy",
      get(stores::get_policy::<S>).put(stores::put_policy::<S>),
    )
    .with_state(store)
}
