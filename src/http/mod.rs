//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing span)
//!     → security::cors (preflight / verb checks)
//!     → security::rate_limit (per-client admission)
//!     → request.rs (extract path, raw query, forwarded headers)
//!     → signing + upstream (signed GET, streamed relay)
//!     → response.rs (error pages for every early exit)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::InboundRequest;
pub use response::{error_page, ProxyError};
pub use server::{AppState, HttpServer, X_REQUEST_ID};
