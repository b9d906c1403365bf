//! Core types and trait definitions for the shopkeep review-reply engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod adapter;
pub mod error;
pub mod gate;
pub mod generate;
pub mod lifecycle;
pub mod matching;
pub mod policy;
pub mod review;
pub mod store;

pub use error::{Error, Result, RetryClass, Retryable};
