//! HMAC-SHA1 request signing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::config::{SecretString, UpstreamConfig};
use crate::signing::canonical::canonical_string;

type HmacSha1 = Hmac<Sha1>;

/// Scheme name that prefixes every authorization header.
pub const AUTH_SCHEME: &str = "Summon";

/// Upstream API credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_id: String,
    pub secret_key: SecretString,
}

impl Credentials {
    pub fn new(access_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_id: access_id.into(),
            secret_key: SecretString::new(secret_key),
        }
    }
}

impl From<&UpstreamConfig> for Credentials {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            access_id: config.access_id.clone(),
            secret_key: config.secret_key.clone(),
        }
    }
}

/// Compute the `Authorization` header for an upstream request.
///
/// Deterministic: the same inputs always produce the same header, so the
/// timestamp passed here must be the one sent as `x-summon-date`.
pub fn sign(
    credentials: &Credentials,
    accept: impl AsRef<[u8]>,
    timestamp: &str,
    host: &str,
    path: &str,
    raw_query: &str,
) -> String {
    let canonical = canonical_string(accept, timestamp, host, path, raw_query);
    tracing::trace!(canonical = %String::from_utf8_lossy(&canonical), "Signing canonical string");

    let mut mac = HmacSha1::new_from_slice(credentials.secret_key.expose().as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(&canonical);
    let digest = STANDARD.encode(mac.finalize().into_bytes());

    format!("{} {};{}", AUTH_SCHEME, credentials.access_id, digest)
}
