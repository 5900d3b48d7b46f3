// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Shepherd API Library
//!
//! HTTP surface for the billing engine: the payment-gateway webhook endpoint
//! and the capability-guarded operator API for subscriptions, tier changes,
//! data retention, and background jobs.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
