//! Upstream call and response relay.

use std::io;
use std::time::Duration;

use axum::{
    body::{Body, BodyDataStream, Bytes},
    http::{header, HeaderValue, Method, Request, Uri},
    response::Response,
};
use futures_util::{stream, Stream, StreamExt};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::time::Instant;
use url::Url;

use crate::config::{ConfigError, TimeoutConfig, UpstreamConfig};
use crate::http::request::InboundRequest;
use crate::http::response::ProxyError;
use crate::observability::metrics;
use crate::security::cors::SESSION_ID_HEADER;

/// Header carrying the timestamp that was signed.
pub const DATE_HEADER: &str = "x-summon-date";

type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Where one inbound request will be sent.
///
/// Holds the request-target as a string: the inbound path and query are
/// appended byte for byte, never re-encoded or normalized.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    path_and_query: String,
    path_len: usize,
}

impl UpstreamTarget {
    fn new(base_path: &str, path: &str, raw_query: &str) -> Self {
        let mut path_and_query = String::with_capacity(base_path.len() + path.len() + raw_query.len() + 1);
        path_and_query.push_str(base_path);
        path_and_query.push_str(path);
        let path_len = path_and_query.len();
        if !raw_query.is_empty() {
            path_and_query.push('?');
            path_and_query.push_str(raw_query);
        }
        Self {
            path_and_query,
            path_len,
        }
    }

    /// Path as it goes on the wire.
    pub fn path(&self) -> &str {
        &self.path_and_query[..self.path_len]
    }

    /// Raw query as it goes on the wire, empty when absent.
    pub fn query(&self) -> &str {
        self.path_and_query
            .get(self.path_len + 1..)
            .unwrap_or_default()
    }

    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }
}

/// Host the upstream expects in the canonical string: the URL's host,
/// plus `:port` when the URL names a non-default port.
pub fn signing_host(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Sends signed GET requests to the single configured upstream.
#[derive(Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    origin: String,
    base_path: String,
    host: String,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&upstream.base_url)?;
        let host = signing_host(&base_url)
            .ok_or(ConfigError::UpstreamUrl(url::ParseError::EmptyHost))?;
        let origin = format!("{}://{}", base_url.scheme(), host);
        let base_path = base_url.path().trim_end_matches('/').to_string();

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(ConfigError::TlsRoots)?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        // No idle connections: every upstream call opens and closes its own.
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(https);

        Ok(Self {
            client,
            origin,
            base_path,
            host,
            timeout: timeouts.upstream(),
        })
    }

    /// Host (with explicit port, if any) the signature is computed for.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Resolve the upstream request-target for an inbound path and raw query.
    pub fn target(&self, path: &str, raw_query: &str) -> UpstreamTarget {
        UpstreamTarget::new(&self.base_path, path, raw_query)
    }

    /// Perform the upstream call and relay its response.
    ///
    /// One attempt only. The configured timeout bounds the whole exchange:
    /// connecting, waiting for headers and streaming the body. A body still
    /// open at the deadline is cut off.
    pub async fn forward(
        &self,
        target: &UpstreamTarget,
        inbound: &InboundRequest,
        timestamp: &str,
        authorization: &str,
    ) -> Result<Response, ProxyError> {
        let deadline = Instant::now() + self.timeout;
        let uri = format!("{}{}", self.origin, target.path_and_query());

        let request = self.build_request(&uri, inbound, timestamp, authorization).map_err(|e| {
            tracing::error!(uri = %uri, error = %e, "Could not build upstream request");
            metrics::record_upstream_error("request");
            ProxyError::Upstream(e.into())
        })?;

        tracing::debug!(uri = %uri, "Forwarding to upstream");

        let upstream = match tokio::time::timeout_at(deadline, self.client.request(request)).await {
            Err(_) => {
                tracing::error!(
                    uri = %uri,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Upstream request timed out"
                );
                metrics::record_upstream_error("timeout");
                return Err(ProxyError::UpstreamTimeout);
            }
            Ok(Err(e)) => {
                tracing::error!(uri = %uri, error = %e, "Upstream request failed");
                metrics::record_upstream_error(if e.is_connect() { "connect" } else { "transport" });
                return Err(ProxyError::Upstream(e.into()));
            }
            Ok(Ok(response)) => response,
        };

        Ok(relay(upstream, deadline))
    }

    fn build_request(
        &self,
        uri: &str,
        inbound: &InboundRequest,
        timestamp: &str,
        authorization: &str,
    ) -> Result<Request<Body>, axum::http::Error> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(Uri::try_from(uri)?)
            .header(DATE_HEADER, timestamp)
            .header(header::AUTHORIZATION, authorization);
        if let Some(accept) = &inbound.accept {
            builder = builder.header(header::ACCEPT, accept.clone());
        }
        if let Some(session_id) = &inbound.session_id {
            builder = builder.header(SESSION_ID_HEADER, session_id.clone());
        }
        builder.body(Body::empty())
    }
}

/// Convert an upstream response into the client response: status verbatim,
/// only `Content-Type` copied, body streamed until the deadline.
fn relay(upstream: hyper::Response<Incoming>, deadline: Instant) -> Response {
    let (parts, incoming) = upstream.into_parts();
    let content_type: Option<HeaderValue> = parts.headers.get(header::CONTENT_TYPE).cloned();

    tracing::debug!(status = parts.status.as_u16(), "Relaying upstream response");

    let body = Body::new(incoming).into_data_stream();
    let mut response = Response::new(Body::from_stream(until_deadline(body, deadline)));
    *response.status_mut() = parts.status;
    if let Some(value) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

/// Yield body chunks until the stream ends or `deadline` passes; past the
/// deadline the stream fails so the client connection is aborted instead of
/// ending with a truncated but well-formed body.
fn until_deadline(
    body: BodyDataStream,
    deadline: Instant,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    let sleep = Box::pin(tokio::time::sleep_until(deadline));

    stream::try_unfold((body, sleep), |(mut body, mut sleep)| async move {
        tokio::select! {
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => Ok(Some((bytes, (body, sleep)))),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Upstream body stream failed");
                    Err(io::Error::other(e))
                }
                None => Ok(None),
            },
            _ = &mut sleep => {
                tracing::warn!("Upstream body timed out");
                metrics::record_upstream_error("body_timeout");
                Err(io::Error::new(io::ErrorKind::TimedOut, "upstream body timed out"))
            }
        }
    })
}
