//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest + signed Authorization + timestamp
//!     → forwarder.rs (build GET, bounded timeout, single attempt)
//!     → upstream API
//!     → forwarder.rs (status verbatim, Content-Type only, streamed body)
//! ```
//!
//! # Design Decisions
//! - No retries: one upstream call per admitted request
//! - No idle connections kept; every call opens a fresh connection
//! - Transport failures surface as 500 with a fixed message

pub mod forwarder;

pub use forwarder::{signing_host, Forwarder, UpstreamTarget, DATE_HEADER};
