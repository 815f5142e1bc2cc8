//! Upstream request signing.
//!
//! # Data Flow
//! ```text
//! accept, timestamp, host, path, raw query
//!     → canonical.rs (sorted query, newline-joined canonical string)
//!     → signer.rs (HMAC-SHA1 with the secret key, Base64)
//!     → "Summon <access id>;<digest>"
//! ```
//!
//! # Design Decisions
//! - Pure functions: no clock or config reads inside `sign`
//! - Query tokens are signed exactly as received; the upstream recomputes
//!   the digest from the raw query it sees

pub mod canonical;
pub mod signer;

pub use canonical::{canonical_string, rfc2616_now, sorted_query};
pub use signer::{sign, Credentials};
