//! Authenticating CORS proxy for the Summon API.
//!
//! Browsers call the proxy without credentials; the proxy checks CORS,
//! optionally rate limits per client, signs the request with the configured
//! access ID and secret key, and streams the upstream response back.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod signing;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
