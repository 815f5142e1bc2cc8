//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require upstream credentials and a parseable upstream URL
//! - Validate value ranges (timeouts > 0, rates > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("an access ID for the upstream API is required")]
    MissingAccessId,

    #[error("a secret key for the upstream API is required")]
    MissingSecretKey,

    #[error("upstream base URL '{url}' is invalid: {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("bind address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("metrics address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("unknown log level '{0}'")]
    InvalidLogLevel(String),

    #[error("upstream timeout must be greater than zero")]
    ZeroTimeout,

    #[error("rate limit must be a positive number of requests per second, got {0}")]
    InvalidRate(f64),

    #[error("rate limit {0} must be greater than zero")]
    ZeroRateLimitWindow(&'static str),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstream.access_id.trim().is_empty() {
        errors.push(ValidationError::MissingAccessId);
    }
    if config.upstream.secret_key.is_empty() {
        errors.push(ValidationError::MissingSecretKey);
    }
    if let Err(reason) = check_upstream_url(&config.upstream.base_url) {
        errors.push(ValidationError::InvalidUpstreamUrl {
            url: config.upstream.base_url.clone(),
            reason,
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if config.observability.log_level.parse::<tracing::Level>().is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        if !(rl.requests_per_second.is_finite() && rl.requests_per_second > 0.0) {
            errors.push(ValidationError::InvalidRate(rl.requests_per_second));
        }
        if rl.idle_eviction_secs == 0 {
            errors.push(ValidationError::ZeroRateLimitWindow("idle eviction window"));
        }
        if rl.sweep_interval_secs == 0 {
            errors.push(ValidationError::ZeroRateLimitWindow("sweep interval"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() {
        return Err("must not carry a query string".to_string());
    }
    Ok(url)
}
