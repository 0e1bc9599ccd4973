// SPDX-License-Identifier: Apache-2.0

//! Rate limiting for push/pull streams.
//!
//! This crate provides a stream operator that gates every event behind a
//! permit from an external rate limiter, while preserving the backpressure
//! protocol between a producer and its consumer: demand flows through
//! unchanged, cancellation reaches the producer once, and the consumer sees
//! at most one terminal signal.

mod config;
mod error;
mod limiter;
mod operator;
mod stream;

pub use config::RateLimiterConfig;
pub use error::Error;
pub use limiter::{validate_limiter_name, RateLimiter};
pub use operator::{Permit, RateLimitedOperator};
pub use stream::{DownstreamSubscription, UpstreamHandle, UpstreamListener};
