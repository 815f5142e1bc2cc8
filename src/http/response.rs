//! Response handling and transformation.
//!
//! # Responsibilities
//! - Map proxy failures to client-facing status codes
//! - Render short HTML error pages that never leak internals
//!
//! # Design Decisions
//! - Error bodies only carry the fixed message of the variant; transport
//!   error detail goes to the log, not the client

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    BoxError,
};
use thiserror::Error;

/// Every way a proxied request can end without reaching the client as an
/// upstream response.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Access-Control-Request-Method header should be set for OPTIONS request.")]
    PreflightMethodMissing,

    #[error("Access-Control-Request-Method header should only be GET.")]
    PreflightMethodNotGet,

    #[error("Access-Control-Request-Headers header should only contain x-summon-session-id.")]
    PreflightHeadersNotAllowed,

    #[error("Only GET requests accepted.")]
    MethodNotAllowed,

    #[error("Rate limit exceeded.")]
    RateLimited,

    #[error("Upstream request timed out.")]
    UpstreamTimeout,

    #[error("Upstream request failed.")]
    Upstream(#[source] BoxError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::PreflightMethodMissing
            | ProxyError::PreflightMethodNotGet
            | ProxyError::PreflightHeadersNotAllowed => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::UpstreamTimeout | ProxyError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error_page(self.status(), &self.to_string())
    }
}

/// Render an error as a minimal HTML page.
pub fn error_page(status: StatusCode, message: &str) -> Response {
    let body = format!(
        "<html><head></head><body><pre>{} {} - {}</pre></body></html>",
        status.as_u16(),
        status.canonical_reason().unwrap_or(""),
        message
    );

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}
