//! Chainfeed Resilience Crate
//!
//! This crate provides the resilience layer shared by every Chainfeed tool
//! call. Provider modules plug into it through two capability traits and
//! never see each other.
//!
//! # Overview
//!
//! - A process-local [`Cache`] with per-entry TTL and a longer stale window
//! - One sliding-window [`RateLimiter`] per provider
//! - A [`FallbackOrchestrator`] that walks providers in priority order,
//!   merges partial batch results and degrades to stale data
//!
//! # Architecture
//!
//! ```text
//!   tool request
//!        |
//!        v
//! +------------------+   fresh hit   +------------------+
//! |   Orchestrator   | ------------> |      Cache       |
//! +------------------+               +------------------+
//!        | miss                              ^
//!        v                                   | set / get_stale
//! +------------------+     +------------------+
//! |   RateLimiter    | --> |  Source (trait)  |  (CoinGecko, RPC, ...)
//! +------------------+     +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Cache`] - Bounded key/value store with TTL and stale reads
//! - [`RateLimiter`] / [`RateLimiters`] - Per-provider sliding windows
//! - [`SingleSource`] / [`BatchSource`] - Provider capability shapes
//! - [`SinglePlan`] / [`BatchPlan`] - One logical request's fallback chain
//! - [`Fetched`] - A value plus its [`Freshness`] and [`FallbackState`]
//! - [`ProviderFailure`] / [`FetchError`] - Failure taxonomy

pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod rate_limiter;

pub use cache::{Cache, CacheStats, Payload};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, FallbackPolicy, RateLimitConfig, TtlConfig};
pub use errors::{FailureKind, FetchError, ProviderFailure, RetryClass};
pub use orchestrator::{
    batch_source_fn, source_fn, AttemptOutcome, AttemptReport, BatchPlan, BatchSource, FallbackOrchestrator,
    FallbackState, Fetched, Freshness, ProviderAttempt, SingleSource, SinglePlan,
};
pub use rate_limiter::{RateLimiter, RateLimiters};

use std::borrow::Cow;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;
