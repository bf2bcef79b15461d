//! Bearer-token authentication and auth-route rate limiting.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::config::Config;
use crate::db::Database;

/// Service-level security settings.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// Allowed CORS origins. `None` means permissive.
    pub cors_origins: Option<Vec<String>>,
    /// Limiter applied to signup and login.
    pub auth_rate_limiter: Option<RateLimiter>,
}

impl SecurityConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cors_origins: config.cors_origins.clone(),
            auth_rate_limiter: Some(RateLimiter::new(
                config.auth_rate_limit,
                Duration::from_secs(60),
            )),
        }
    }

    /// No CORS restriction and no rate limiting (for testing).
    pub fn disabled() -> Self {
        Self {
            cors_origins: None,
            auth_rate_limiter: None,
        }
    }

    /// Rate limit auth routes to `max_requests` per minute (for testing).
    pub fn with_auth_rate_limit(max_requests: u32) -> Self {
        Self {
            cors_origins: None,
            auth_rate_limiter: Some(RateLimiter::new(max_requests, Duration::from_secs(60))),
        }
    }
}

/// Tracked IPs at which `check` first sweeps out idle entries.
const PRUNE_FLOOR: usize = 1024;

/// In-memory sliding-window rate limiter keyed by client IP.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    requests: Arc<Mutex<Hits>>,
}

#[derive(Debug)]
struct Hits {
    by_ip: HashMap<IpAddr, Vec<Instant>>,
    /// Map size that triggers the next sweep. Doubles with the live set so
    /// sweeps stay amortized.
    prune_at: usize,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_prune_floor(max_requests, window, PRUNE_FLOOR)
    }

    fn with_prune_floor(max_requests: u32, window: Duration, floor: usize) -> Self {
        Self {
            max_requests,
            window,
            requests: Arc::new(Mutex::new(Hits {
                by_ip: HashMap::new(),
                prune_at: floor,
            })),
        }
    }

    /// Returns true if allowed, false if rate limited.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();

        let mut hits = self.requests.lock().expect("rate limiter lock poisoned");
        if hits.by_ip.len() >= hits.prune_at {
            self.prune(&mut hits.by_ip, now);
            hits.prune_at = hits.prune_at.max(hits.by_ip.len() * 2);
        }

        let entry = hits.by_ip.entry(ip).or_default();
        entry.retain(|&t| now.duration_since(t) < self.window);

        if entry.len() < self.max_requests as usize {
            entry.push(now);
            true
        } else {
            false
        }
    }

    /// Drop IPs whose window has fully expired.
    pub fn cleanup(&self) {
        let mut hits = self.requests.lock().expect("rate limiter lock poisoned");
        self.prune(&mut hits.by_ip, Instant::now());
    }

    fn prune(&self, by_ip: &mut HashMap<IpAddr, Vec<Instant>>, now: Instant) {
        by_ip.retain(|_, timestamps| {
            timestamps.retain(|&t| now.duration_since(t) < self.window);
            !timestamps.is_empty()
        });
    }

    fn tracked_ips(&self) -> usize {
        self.requests
            .lock()
            .expect("rate limiter lock poisoned")
            .by_ip
            .len()
    }
}

/// Resolve `Authorization: Bearer <token>` to a user and stash it in the
/// request extensions for the handler.
pub async fn require_user(
    State(db): State<Database>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) => match header.strip_prefix("Bearer ") {
            Some(token) => token.trim().to_string(),
            None => {
                tracing::warn!("Invalid Authorization header format");
                return Err(StatusCode::UNAUTHORIZED);
            }
        },
        None => {
            tracing::warn!("Missing Authorization header");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let user = db.user_for_token(&token).map_err(|e| {
        tracing::error!("Token lookup failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!("Unknown bearer token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let ip = extract_client_ip(&request);

    if rate_limiter.check(ip) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Rate limit exceeded for IP: {}", ip);
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

/// X-Forwarded-For, then X-Real-IP, then loopback.
fn extract_client_ip(request: &Request<Body>) -> IpAddr {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    if let Some(ip) = header("X-Forwarded-For")
        .and_then(|v| v.split(',').next().and_then(|s| s.trim().parse().ok()))
    {
        return ip;
    }

    if let Some(ip) = header("X-Real-IP").and_then(|v| v.trim().parse().ok()) {
        return ip;
    }

    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_blocks_requests_over_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let ip: IpAddr = "10.0.0.7".parse().unwrap();

        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(!limiter.check(ip));
    }

    #[test]
    fn rate_limiter_tracks_ips_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let ip1: IpAddr = "10.0.0.1".parse().unwrap();
        let ip2: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(ip1));
        assert!(!limiter.check(ip1));
        assert!(limiter.check(ip2));
    }

    #[test]
    fn rate_limiter_window_slides() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(limiter.check(ip));
        assert!(!limiter.check(ip));
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check(ip));
    }

    #[test]
    fn cleanup_forgets_idle_ips() {
        let limiter = RateLimiter::new(5, Duration::from_millis(10));
        limiter.check("10.0.0.1".parse().unwrap());
        assert_eq!(limiter.tracked_ips(), 1);

        std::thread::sleep(Duration::from_millis(20));
        limiter.cleanup();
        assert_eq!(limiter.tracked_ips(), 0);
    }

    #[test]
    fn check_sweeps_idle_ips_that_never_hit_the_limit() {
        let limiter = RateLimiter::with_prune_floor(5, Duration::from_millis(10), 3);
        for last in 1..=3 {
            assert!(limiter.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))));
        }
        assert_eq!(limiter.tracked_ips(), 3);

        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("10.0.1.1".parse().unwrap()));
        assert_eq!(limiter.tracked_ips(), 1);
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let request = Request::builder()
            .header("X-Forwarded-For", "203.0.113.9, 10.0.0.1")
            .header("X-Real-IP", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_client_ip(&request),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );

        let request = Request::builder()
            .header("X-Real-IP", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_client_ip(&request),
            "198.51.100.2".parse::<IpAddr>().unwrap()
        );

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_client_ip(&request), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn security_config_follows_config() {
        let config = Config {
            cors_origins: Some(vec!["https://a.io".into()]),
            auth_rate_limit: 2,
            ..Default::default()
        };
        let security = SecurityConfig::from_config(&config);
        assert_eq!(security.cors_origins, config.cors_origins);
        assert!(security.auth_rate_limiter.is_some());
        assert!(SecurityConfig::disabled().auth_rate_limiter.is_none());
    }
}
