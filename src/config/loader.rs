//! Configuration loading.
//!
//! Precedence per option: explicit flag, else environment variable, else
//! config file value, else built-in default.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::cli::Cli;
use crate::config::schema::{ProxyConfig, SecretString};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid upstream URL: {0}")]
    UpstreamUrl(#[from] url::ParseError),

    #[error("Failed to load TLS root certificates: {0}")]
    TlsRoots(#[source] std::io::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a TOML file without validating it.
pub fn read_config_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Resolve the final configuration from the command line, environment and
/// optional config file, then validate it.
pub fn load_config(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => read_config_file(path)?,
        None => ProxyConfig::default(),
    };

    apply_overrides(&mut config, cli);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn apply_overrides(config: &mut ProxyConfig, cli: &Cli) {
    if let Some(v) = &cli.address {
        config.listener.bind_address = v.clone();
    }
    if let Some(v) = &cli.summon_api {
        config.upstream.base_url = v.clone();
    }
    if let Some(v) = &cli.access_id {
        config.upstream.access_id = v.clone();
    }
    if let Some(v) = &cli.secret_key {
        config.upstream.secret_key = SecretString::new(v.clone());
    }
    if let Some(v) = &cli.allowed_origins {
        config.cors.allowed_origins = v.clone();
    }
    if let Some(v) = cli.max_age {
        config.cors.max_age_secs = v;
    }
    if let Some(v) = cli.timeout {
        config.timeouts.upstream_secs = v;
    }
    if let Some(v) = cli.rate_limit {
        config.rate_limit.enabled = v;
    }
    if let Some(v) = cli.rate_limit_rps {
        config.rate_limit.requests_per_second = v;
    }
    if let Some(v) = cli.rate_limit_burst {
        config.rate_limit.burst_size = Some(v);
    }
    if let Some(v) = cli.trust_proxy_headers {
        config.rate_limit.trust_proxy_headers = v;
    }
    if let Some(v) = &cli.log_level {
        config.observability.log_level = v.clone();
    }
    if let Some(v) = cli.log_format {
        config.observability.log_format = v;
    }
    if let Some(v) = &cli.metrics_address {
        config.observability.metrics_address = Some(v.clone());
    }
}
