//! Cross-origin request gate.
//!
//! Runs before anything else touches the request. Preflights are answered
//! here and never reach the rate limiter or the upstream.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;
use crate::http::response::ProxyError;

/// The only request header browsers may ask to send.
pub const SESSION_ID_HEADER: &str = "x-summon-session-id";

/// Origins permitted to read proxied responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// `*`: any origin.
    Any,
    /// Exact, case-sensitive origin strings.
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parse a `;`-delimited origin list. A lone `*` allows any origin.
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == "*" {
            return AllowedOrigins::Any;
        }
        AllowedOrigins::List(
            raw.split(';')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Value for `Access-Control-Allow-Origin`, if the origin is allowed.
    pub fn allow_origin(&self, origin: &HeaderValue) -> Option<HeaderValue> {
        match self {
            AllowedOrigins::Any => Some(HeaderValue::from_static("*")),
            AllowedOrigins::List(list) => {
                let origin_str = origin.to_str().ok()?;
                list.iter()
                    .any(|allowed| allowed == origin_str)
                    .then(|| origin.clone())
            }
        }
    }
}

/// Outcome of a successful CORS check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsDecision {
    /// Valid preflight; answer it directly.
    Preflight { allow_origin: Option<HeaderValue> },
    /// Carry on down the pipeline, adding the header to the final response.
    Continue { allow_origin: Option<HeaderValue> },
}

/// Immutable CORS settings shared by every request.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
    max_age: HeaderValue,
}

impl CorsPolicy {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            origins: AllowedOrigins::parse(&config.allowed_origins),
            max_age: HeaderValue::from(config.max_age_secs),
        }
    }

    /// Validate the request's cross-origin headers.
    pub fn check(&self, method: &Method, headers: &HeaderMap) -> Result<CorsDecision, ProxyError> {
        let Some(origin) = headers.get(header::ORIGIN) else {
            return Ok(CorsDecision::Continue { allow_origin: None });
        };
        let allow_origin = self.origins.allow_origin(origin);

        if method == Method::OPTIONS {
            match headers.get(header::ACCESS_CONTROL_REQUEST_METHOD) {
                None => return Err(ProxyError::PreflightMethodMissing),
                Some(m) if m.as_bytes() != b"GET" => return Err(ProxyError::PreflightMethodNotGet),
                Some(_) => {}
            }
            if let Some(requested) = headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
                if requested.as_bytes() != SESSION_ID_HEADER.as_bytes() {
                    return Err(ProxyError::PreflightHeadersNotAllowed);
                }
            }
            return Ok(CorsDecision::Preflight { allow_origin });
        }

        if method != Method::GET {
            return Err(ProxyError::MethodNotAllowed);
        }

        Ok(CorsDecision::Continue { allow_origin })
    }

    /// Empty 200 answering a valid preflight.
    pub fn preflight_response(&self, allow_origin: Option<HeaderValue>) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::OK;

        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(SESSION_ID_HEADER),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        if let Some(value) = allow_origin {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        response
    }
}

/// Middleware applying the CORS gate.
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match policy.check(request.method(), request.headers()) {
        Err(e) => {
            tracing::info!(
                method = %request.method(),
                path = %request.uri().path(),
                status = e.status().as_u16(),
                reason = %e,
                "Rejected cross-origin request"
            );
            e.into_response()
        }
        Ok(CorsDecision::Preflight { allow_origin }) => {
            tracing::debug!(allowed = allow_origin.is_some(), "Answered preflight");
            policy.preflight_response(allow_origin)
        }
        Ok(CorsDecision::Continue { allow_origin }) => {
            let mut response = next.run(request).await;
            if let Some(value) = allow_origin {
                response
                    .headers_mut()
                    .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
            response
        }
    }
}
