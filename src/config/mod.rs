//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! flags / SUMMON_PROXY_* env (cli.rs)
//!     + optional TOML file (loader.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Invalid config is fatal before the listener is bound

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load_config, ConfigError};
pub use schema::{
    CorsConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, RateLimitConfig,
    SecretString, TimeoutConfig, UpstreamConfig,
};
