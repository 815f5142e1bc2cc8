//! Per-client rate limiting.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::http::response::ProxyError;
use crate::observability::metrics;

/// Key used when the transport did not report a peer address.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Admission control for inbound requests.
pub trait RateLimiter: Send + Sync {
    /// Consume one permit for `key`. Returns false when the client is over
    /// its limit.
    fn check(&self, key: &str) -> bool;

    /// Drop state for idle clients, returning how many were removed.
    fn sweep(&self) -> usize {
        0
    }

    /// Number of clients currently tracked.
    fn tracked_clients(&self) -> usize {
        0
    }
}

/// Limiter used when rate limiting is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn check(&self, _key: &str) -> bool {
        true
    }
}

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets keyed by client, stored in a sharded map.
///
/// A bucket is only touched while its shard lock is held, so the
/// refill-check-consume sequence is atomic per key.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    buckets: DashMap<String, TokenBucket>,
    capacity: f64,
    refill_rate: f64,
    idle_eviction: Duration,
}

impl TokenBucketLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_rate(
            config.requests_per_second,
            config.capacity(),
            config.idle_eviction(),
        )
    }

    pub fn with_rate(refill_rate: f64, capacity: f64, idle_eviction: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_rate,
            idle_eviction,
        }
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            return bucket.try_acquire(now, self.capacity, self.refill_rate);
        }

        self.buckets
            .entry(key.to_owned())
            .or_insert_with(|| TokenBucket::new(self.capacity, now))
            .try_acquire(now, self.capacity, self.refill_rate)
    }

    fn sweep_at(&self, now: Instant) -> usize {
        // A bucket may only go once it has refilled completely, otherwise
        // evicting it would hand the client a fresh burst early.
        let refill_time = Duration::try_from_secs_f64(self.capacity / self.refill_rate)
            .unwrap_or(Duration::MAX);
        let horizon = self.idle_eviction.max(refill_time);

        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < horizon);
        before.saturating_sub(self.buckets.len())
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Pick the limiter implementation for the configuration.
pub fn limiter_from_config(config: &RateLimitConfig) -> Arc<dyn RateLimiter> {
    if config.enabled {
        tracing::info!(
            requests_per_second = config.requests_per_second,
            capacity = config.capacity(),
            trust_proxy_headers = config.trust_proxy_headers,
            "Rate limiting enabled"
        );
        Arc::new(TokenBucketLimiter::new(config))
    } else {
        Arc::new(Unlimited)
    }
}

/// Periodically evict idle buckets until shutdown.
pub fn spawn_sweeper(
    limiter: Arc<dyn RateLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = limiter.sweep();
                    let remaining = limiter.tracked_clients();
                    metrics::record_bucket_count(remaining);
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining, "Evicted idle rate limit buckets");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}

/// Resolve the identity a request is rate limited under.
///
/// Forwarding headers are only honoured when `trust_proxy_headers` is set;
/// otherwise any client could pick its own key.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let forwarded_for = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = forwarded_for.or_else(real_ip) {
            return key.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// State for the rate limit middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<dyn RateLimiter>,
    pub trust_proxy_headers: bool,
}

/// Middleware rejecting clients that ran out of permits.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer, state.trust_proxy_headers);

    if state.limiter.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        metrics::record_rate_limited();
        ProxyError::RateLimited.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::thread;

    fn limiter(rate: f64, capacity: f64) -> TokenBucketLimiter {
        TokenBucketLimiter::with_rate(rate, capacity, Duration::from_secs(300))
    }

    #[test]
    fn test_one_per_second() {
        let l = limiter(1.0, 1.0);
        let t0 = Instant::now();

        assert!(l.check_at("10.0.0.1", t0));
        assert!(!l.check_at("10.0.0.1", t0 + Duration::from_millis(100)));
        // Other clients are unaffected.
        assert!(l.check_at("10.0.0.2", t0 + Duration::from_millis(100)));
        // Refilled after a second.
        assert!(l.check_at("10.0.0.1", t0 + Duration::from_millis(1100)));
    }

    #[test]
    fn test_burst_then_refill() {
        let l = limiter(2.0, 3.0);
        let t0 = Instant::now();

        for _ in 0..3 {
            assert!(l.check_at("c", t0));
        }
        assert!(!l.check_at("c", t0));
        assert!(l.check_at("c", t0 + Duration::from_millis(500)));
        assert!(!l.check_at("c", t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_fractional_rate() {
        let l = limiter(0.5, 1.0);
        let t0 = Instant::now();

        assert!(l.check_at("c", t0));
        assert!(!l.check_at("c", t0 + Duration::from_millis(1500)));
        assert!(l.check_at("c", t0 + Duration::from_millis(2100)));
    }

    #[test]
    fn test_tokens_capped_at_capacity() {
        let l = limiter(10.0, 2.0);
        let t0 = Instant::now();

        assert!(l.check_at("c", t0));
        let later = t0 + Duration::from_secs(60);
        assert!(l.check_at("c", later));
        assert!(l.check_at("c", later));
        assert!(!l.check_at("c", later));
    }

    #[test]
    fn test_sweep_evicts_idle_buckets() {
        let l = TokenBucketLimiter::with_rate(1.0, 1.0, Duration::from_secs(10));
        let t0 = Instant::now();

        l.check_at("old", t0);
        l.check_at("fresh", t0 + Duration::from_secs(8));
        assert_eq!(l.tracked_clients(), 2);

        assert_eq!(l.sweep_at(t0 + Duration::from_secs(11)), 1);
        assert_eq!(l.tracked_clients(), 1);
        assert!(l.buckets.contains_key("fresh"));
    }

    #[test]
    fn test_sweep_keeps_buckets_still_refilling() {
        // 0.01/s takes 100s to refill one token; a 10s idle window must not
        // reset the client early.
        let l = TokenBucketLimiter::with_rate(0.01, 1.0, Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(l.check_at("c", t0));
        assert_eq!(l.sweep_at(t0 + Duration::from_secs(20)), 0);
        assert!(!l.check_at("c", t0 + Duration::from_secs(20)));
    }

    #[test]
    fn test_concurrent_checks_never_overgrant() {
        let l = Arc::new(limiter(0.001, 50.0));
        let granted = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let l = l.clone();
                let granted = granted.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        if l.check("shared") {
                            granted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                        l.check(&format!("client-{}", i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(granted.load(std::sync::atomic::Ordering::SeqCst), 50);
        assert_eq!(l.tracked_clients(), 9);
    }

    #[test]
    fn test_unlimited_always_admits() {
        let l = Unlimited;
        for _ in 0..1000 {
            assert!(l.check("c"));
        }
        assert_eq!(l.tracked_clients(), 0);
    }

    #[test]
    fn test_client_key_resolution() {
        let peer: SocketAddr = "192.0.2.7:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));

        assert_eq!(client_key(&headers, Some(peer), false), "192.0.2.7");
        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.9");

        headers.remove("x-forwarded-for");
        assert_eq!(client_key(&headers, Some(peer), true), "198.51.100.4");

        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        headers.insert("x-real-ip", HeaderValue::from_static("  "));
        assert_eq!(client_key(&headers, Some(peer), true), "192.0.2.7");

        assert_eq!(client_key(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_limiter_from_config() {
        let mut config = RateLimitConfig::default();
        let disabled = limiter_from_config(&config);
        assert!(disabled.check("c"));
        assert!(disabled.check("c"));

        config.enabled = true;
        let enabled = limiter_from_config(&config);
        assert!(enabled.check("c"));
        assert!(!enabled.check("c"));
    }
}
