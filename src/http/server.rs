//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware in pipeline order (request ID, tracing, metrics,
//!   CORS gate, rate limiter)
//! - Sign and forward admitted requests to the upstream
//! - Bind server to listener and shut down gracefully

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::validation::validate_config;
use crate::config::{ConfigError, ProxyConfig};
use crate::http::request::InboundRequest;
use crate::observability::metrics;
use crate::security::cors::{cors_middleware, CorsPolicy};
use crate::security::rate_limit::{
    limiter_from_config, rate_limit_middleware, spawn_sweeper, RateLimitState, RateLimiter,
};
use crate::signing::{rfc2616_now, sign, Credentials};
use crate::upstream::Forwarder;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<Credentials>,
    pub forwarder: Arc<Forwarder>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
    limiter: Arc<dyn RateLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Fails when the configuration is invalid; nothing is bound yet.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let state = AppState {
            credentials: Arc::new(Credentials::from(&config.upstream)),
            forwarder: Arc::new(Forwarder::new(&config.upstream, &config.timeouts)?),
        };
        let cors = Arc::new(CorsPolicy::new(&config.cors));
        let limiter = limiter_from_config(&config.rate_limit);
        let rate_limit = RateLimitState {
            limiter: limiter.clone(),
            trust_proxy_headers: config.rate_limit.trust_proxy_headers,
        };

        let router = Self::build_router(state, cors, rate_limit);
        Ok(Self {
            router,
            config: Arc::new(config),
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers added later run first: the CORS gate sees the request before
    /// the rate limiter, which sees it before the handler.
    fn build_router(state: AppState, cors: Arc<CorsPolicy>, rate_limit: RateLimitState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(rate_limit, rate_limit_middleware))
            .layer(middleware::from_fn_with_state(cors, cors_middleware))
            .layer(middleware::from_fn(metrics::track_requests))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(make_span))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The fully layered router, for serving or driving directly in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        let sweeper = self.config.rate_limit.enabled.then(|| {
            spawn_sweeper(
                self.limiter.clone(),
                self.config.rate_limit.sweep_interval(),
                shutdown.resubscribe(),
            )
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        if let Some(handle) = sweeper {
            let _ = handle.await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn make_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Main proxy handler.
/// Signs the admitted request and relays the upstream response.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let inbound = InboundRequest::from_request(&request);
    drop(request);

    let target = state.forwarder.target(&inbound.path, &inbound.raw_query);

    // Computed once: the signed timestamp and x-summon-date must match.
    let timestamp = rfc2616_now();
    let authorization = sign(
        &state.credentials,
        inbound.accept_bytes(),
        &timestamp,
        state.forwarder.host(),
        target.path(),
        target.query(),
    );

    match state
        .forwarder
        .forward(&target, &inbound, &timestamp, &authorization)
        .await
    {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
