//! # Per-Client Rate Limiting
//!
//! Token-bucket admission control keyed by client IP address. A bucket is
//! created on a client's first request and evicted by a periodic sweep once
//! the client has been idle past the configured threshold. The client map
//! sits behind a single mutex that is held only for the map lookup and the
//! bucket arithmetic.
//!
//! Clients are keyed by the socket peer. `X-Forwarded-For` and `X-Real-IP`
//! are read only when the peer is a configured trusted proxy.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// When false every request is admitted.
    pub enabled: bool,
    /// Bucket refill rate.
    pub requests_per_second: f64,
    /// Bucket capacity.
    pub burst: u32,
    /// Clients unseen for longer than this are evicted.
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    /// Peers whose forwarding headers name the real client.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst: 4,
            idle_timeout: Duration::from_secs(3 * 60),
            sweep_interval: Duration::from_secs(60),
            trusted_proxies: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(max_tokens: u32, refill_rate: f64, now: Instant) -> Self {
        Self {
            tokens: f64::from(max_tokens),
            max_tokens: f64::from(max_tokens),
            refill_rate,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }
}

#[derive(Debug)]
struct Client {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Shared limiter state. Cloning shares the client map.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: Arc<RateLimitConfig>,
    clients: Arc<Mutex<HashMap<IpAddr, Client>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config: Arc::new(config),
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Admit or reject one request from `ip`.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    /// [`RateLimiter::check`] with an explicit clock reading.
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        if !self.config.enabled {
            return true;
        }
        let mut clients = self.clients.lock();
        let client = clients.entry(ip).or_insert_with(|| Client {
            bucket: TokenBucket::new(self.config.burst, self.config.requests_per_second, now),
            last_seen: now,
        });
        if now > client.last_seen {
            client.last_seen = now;
        }
        client.bucket.try_acquire(now)
    }

    /// Evict clients idle longer than the configured timeout as of `now`.
    /// Returns how many were evicted.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let idle_timeout = self.config.idle_timeout;
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|_, c| now.saturating_duration_since(c.last_seen) <= idle_timeout);
        before - clients.len()
    }

    /// The key a request from `peer` is limited under.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
        client_ip(headers, peer, &self.config.trusted_proxies)
    }

    /// Number of clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.clients.lock().len()
    }

    /// Run the idle sweep every `sweep_interval` until `stop` flips to true
    /// or its sender is dropped.
    pub fn spawn_sweeper(&self, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
        let limiter = self.clone();
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = limiter.sweep_at(Instant::now());
                        if evicted > 0 {
                            tracing::debug!(evicted, remaining = limiter.tracked(), "rate limiter sweep");
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("rate limiter sweep stopped");
        })
    }
}

/// Client address for rate limiting.
///
/// The socket peer, unless the peer is in `trusted_proxies`, in which case the
/// first `X-Forwarded-For` hop or else `X-Real-IP` is used. Requests without a
/// peer share the unspecified address.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxies: &[IpAddr],
) -> IpAddr {
    let Some(peer) = peer.map(|addr| addr.ip()) else {
        return IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    };
    if !trusted_proxies.contains(&peer) {
        return peer;
    }
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    };
    forwarded.or_else(real_ip).unwrap_or(peer)
}

/// Rejects a request with 429 when its client's bucket is empty.
///
/// The [`RateLimiter`] is read from request extensions; without one the
/// request passes through.
pub async fn rate_limit(request: Request, next: Next) -> Response {
    let limiter = request.extensions().get::<RateLimiter>().cloned();

    if let Some(limiter) = limiter.filter(RateLimiter::enabled) {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let ip = limiter.client_key(request.headers(), peer);
        if !limiter.check(ip) {
            tracing::warn!(client = %ip, "rate limit exceeded");
            return AppError::RateLimited.into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rps: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_second: rps,
            burst,
            ..RateLimitConfig::default()
        })
    }

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));

    #[test]
    fn burst_then_one_per_refill_interval() {
        let limiter = limiter(2.0, 4);
        let t0 = Instant::now();
        for _ in 0..4 {
            assert!(limiter.check_at(CLIENT, t0));
        }
        assert!(!limiter.check_at(CLIENT, t0));

        // 1 / rps later exactly one more token is available.
        let t1 = t0 + Duration::from_millis(500);
        assert!(limiter.check_at(CLIENT, t1));
        assert!(!limiter.check_at(CLIENT, t1));
    }

    #[test]
    fn rejection_consumes_nothing() {
        let limiter = limiter(1.0, 1);
        let t0 = Instant::now();
        assert!(limiter.check_at(CLIENT, t0));
        for _ in 0..10 {
            assert!(!limiter.check_at(CLIENT, t0));
        }
        assert!(limiter.check_at(CLIENT, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn clients_have_independent_buckets() {
        let limiter = limiter(1.0, 1);
        let other = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1));
        let t0 = Instant::now();
        assert!(limiter.check_at(CLIENT, t0));
        assert!(!limiter.check_at(CLIENT, t0));
        assert!(limiter.check_at(other, t0));
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn sweep_evicts_only_idle_clients() {
        let limiter = limiter(2.0, 4);
        let other = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1));
        let t0 = Instant::now();
        limiter.check_at(CLIENT, t0);
        limiter.check_at(other, t0 + Duration::from_secs(150));

        let evicted = limiter.sweep_at(t0 + Duration::from_secs(181));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn disabled_admits_everything_and_tracks_nothing() {
        let limiter = RateLimiter::new(RateLimitConfig::disabled());
        let t0 = Instant::now();
        for _ in 0..100 {
            assert!(limiter.check_at(CLIENT, t0));
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn client_ip_is_the_peer_unless_it_is_a_trusted_proxy() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "192.0.2.4".parse().unwrap());
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());

        assert_eq!(client_ip(&headers, Some(peer), &[]), peer.ip());
        assert_eq!(client_ip(&headers, Some(peer), &[peer.ip()]), CLIENT);

        headers.remove("x-forwarded-for");
        assert_eq!(
            client_ip(&headers, Some(peer), &[peer.ip()]),
            "192.0.2.4".parse::<IpAddr>().unwrap()
        );

        headers.remove("x-real-ip");
        assert_eq!(client_ip(&headers, Some(peer), &[peer.ip()]), peer.ip());

        let mut spoofed = HeaderMap::new();
        spoofed.insert("x-forwarded-for", "198.51.100.1".parse().unwrap());
        assert_eq!(
            client_ip(&spoofed, None, &[]),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn rotating_forwarded_for_from_one_peer_shares_a_bucket() {
        let limiter = limiter(1.0, 2);
        let peer: SocketAddr = "192.0.2.50:40000".parse().unwrap();
        let t0 = Instant::now();
        let admitted = (0..50)
            .filter(|i| {
                let mut headers = HeaderMap::new();
                headers.insert("x-forwarded-for", format!("203.0.113.{i}").parse().unwrap());
                limiter.check_at(limiter.client_key(&headers, Some(peer)), t0)
            })
            .count();
        assert_eq!(admitted, 2);
        assert_eq!(limiter.tracked(), 1);
    }

    #[tokio::test]
    async fn sweeper_stops_on_signal() {
        let limiter = limiter(2.0, 4);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = limiter.spawn_sweeper(stop_rx);
        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
