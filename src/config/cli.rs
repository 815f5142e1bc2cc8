//! Command-line surface.
//!
//! Every option is optional so that an unset flag can fall back to its
//! `SUMMON_PROXY_*` environment variable, then to the config file, then to
//! the built-in default. Clap resolves the first two; `loader` the rest.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::LogFormat;

/// Prefix shared by every environment variable the proxy reads.
pub const ENV_PREFIX: &str = "SUMMON_PROXY_";

#[derive(Debug, Default, Parser)]
#[command(name = "summon-proxy", version)]
#[command(about = "Authenticating CORS proxy for the Summon API", long_about = None)]
pub struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, env = "SUMMON_PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address for the server to bind on.
    #[arg(long, env = "SUMMON_PROXY_ADDRESS")]
    pub address: Option<String>,

    /// Upstream API base URL.
    #[arg(long = "summonapi", env = "SUMMON_PROXY_SUMMONAPI")]
    pub summon_api: Option<String>,

    /// Access ID.
    #[arg(long = "accessid", env = "SUMMON_PROXY_ACCESSID")]
    pub access_id: Option<String>,

    /// Secret key.
    #[arg(long = "secretkey", env = "SUMMON_PROXY_SECRETKEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Allowed origins for CORS, delimited by `;`, or `*`.
    #[arg(long = "allowedorigins", env = "SUMMON_PROXY_ALLOWEDORIGINS")]
    pub allowed_origins: Option<String>,

    /// Access-Control-Max-Age for preflight responses, in seconds.
    #[arg(long = "maxage", env = "SUMMON_PROXY_MAXAGE")]
    pub max_age: Option<u64>,

    /// Upstream timeout in seconds.
    #[arg(long, env = "SUMMON_PROXY_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Enable per-client rate limiting.
    #[arg(long = "ratelimit", env = "SUMMON_PROXY_RATELIMIT")]
    pub rate_limit: Option<bool>,

    /// Permits per second per client (fractions allowed).
    #[arg(long = "ratelimitrps", env = "SUMMON_PROXY_RATELIMITRPS")]
    pub rate_limit_rps: Option<f64>,

    /// Bucket capacity per client.
    #[arg(long = "ratelimitburst", env = "SUMMON_PROXY_RATELIMITBURST")]
    pub rate_limit_burst: Option<u32>,

    /// Identify clients by X-Forwarded-For / X-Real-IP.
    #[arg(long = "trustproxyheaders", env = "SUMMON_PROXY_TRUSTPROXYHEADERS")]
    pub trust_proxy_headers: Option<bool>,

    /// Maximum log level: error < warn < info < debug < trace.
    #[arg(long = "loglevel", env = "SUMMON_PROXY_LOGLEVEL")]
    pub log_level: Option<String>,

    /// Log line format.
    #[arg(long = "logformat", env = "SUMMON_PROXY_LOGFORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Prometheus metrics bind address.
    #[arg(long = "metricsaddress", env = "SUMMON_PROXY_METRICSADDRESS")]
    pub metrics_address: Option<String>,
}
