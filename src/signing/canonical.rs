//! Canonical request representation used as HMAC input.

use chrono::{DateTime, Utc};

/// IMF-fixdate layout from RFC 2616 §3.3.1.
const RFC2616_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Current UTC time formatted for `x-summon-date`.
pub fn rfc2616_now() -> String {
    rfc2616(Utc::now())
}

/// Format an instant the way HTTP dates are written.
pub fn rfc2616(at: DateTime<Utc>) -> String {
    at.format(RFC2616_FORMAT).to_string()
}

/// Sort a raw query string by parameter name without decoding it.
///
/// Each `&`-separated token is split at its first `=`. Tokens are ordered by
/// the bytes of their key; the sort is stable so repeated keys keep the order
/// they were received in. A token without `=` is rendered as `key=`.
pub fn sorted_query(raw_query: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = raw_query
        .split('&')
        .filter(|token| !token.is_empty())
        .map(|token| token.split_once('=').unwrap_or((token, "")))
        .collect();

    pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the newline-terminated bytes that get signed.
///
/// `accept` is taken as raw header bytes so values outside visible ASCII
/// are signed exactly as they travel.
pub fn canonical_string(
    accept: impl AsRef<[u8]>,
    timestamp: &str,
    host: &str,
    path: &str,
    raw_query: &str,
) -> Vec<u8> {
    let accept = accept.as_ref();
    let query = sorted_query(raw_query);
    let mut out = Vec::with_capacity(
        accept.len() + timestamp.len() + host.len() + path.len() + query.len() + 5,
    );
    for line in [accept, timestamp.as_bytes(), host.as_bytes(), path.as_bytes(), query.as_bytes()] {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out
}
