//! Request handling.
//!
//! # Responsibilities
//! - Extract the parts of an inbound request the proxy forwards
//! - Keep path and query exactly as received; they are signed verbatim

use axum::http::{header, HeaderValue, Request};

use crate::security::cors::SESSION_ID_HEADER;

/// The slice of an inbound request that survives into the upstream call.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// Path as received, still percent-encoded.
    pub path: String,
    /// Raw query string without the leading `?`. Empty when absent.
    pub raw_query: String,
    /// `Accept` header exactly as received.
    pub accept: Option<HeaderValue>,
    /// `x-summon-session-id`, forwarded only when present.
    pub session_id: Option<HeaderValue>,
}

impl InboundRequest {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let headers = request.headers();

        Self {
            path: request.uri().path().to_string(),
            raw_query: request.uri().query().unwrap_or_default().to_string(),
            accept: headers.get(header::ACCEPT).cloned(),
            session_id: headers.get(SESSION_ID_HEADER).cloned(),
        }
    }

    /// Accept bytes as signed: the raw header, or nothing.
    pub fn accept_bytes(&self) -> &[u8] {
        self.accept.as_ref().map(HeaderValue::as_bytes).unwrap_or_default()
    }
}
