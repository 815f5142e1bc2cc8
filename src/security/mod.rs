//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (preflight answered here, bad verbs rejected)
//!     → rate_limit.rs (per-client token bucket)
//!     → Pass to signing and forwarding
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any check failure, before the upstream is contacted
//! - No trust in client-supplied forwarding headers unless configured

pub mod cors;
pub mod rate_limit;

pub use cors::{cors_middleware, AllowedOrigins, CorsDecision, CorsPolicy};
pub use rate_limit::{
    client_key, limiter_from_config, rate_limit_middleware, spawn_sweeper, RateLimitState,
    RateLimiter, TokenBucketLimiter, Unlimited,
};
