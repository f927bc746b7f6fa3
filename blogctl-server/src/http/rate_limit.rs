//! Fixed-window rate limiting per client address
//!
//! Each limiter counts requests per key inside a window that starts with the
//! key's first request. The key is the socket peer address; `X-Forwarded-For`
//! is only believed when the deployment says a proxy sets it. Responses carry `RateLimit-Limit`,
//! `RateLimit-Remaining` and `RateLimit-Reset` (seconds until the window ends).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::time::Instant;

use super::error::ApiError;
use super::extractors::{client_ip, peer_ip};
use crate::config::RateLimitConfig;

const COMMENT_WINDOW: Duration = Duration::from_secs(60 * 60);
const COMMENT_MAX: u32 = 5;

/// Stale windows are swept once the table grows past this many keys.
const SWEEP_THRESHOLD: usize = 4096;

const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of one `check`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset: Duration,
}

impl Decision {
    fn reset_secs(&self) -> u64 {
        // round up so a client never retries before the window ends
        self.reset.as_secs() + u64::from(self.reset.subsec_nanos() > 0)
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert("ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert("ratelimit-reset", HeaderValue::from(self.reset_secs()));
    }
}

/// One fixed-window limiter
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    message: &'static str,
    trust_proxy: bool,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, message: &'static str) -> Self {
        Self {
            limit,
            window,
            message,
            trust_proxy: false,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Key clients by their first `X-Forwarded-For` entry when present.
    pub fn trusting_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    fn key_for(&self, request: &Request) -> String {
        let key = if self.trust_proxy {
            client_ip(request.headers(), request.extensions())
        } else {
            peer_ip(request.extensions())
        };
        key.unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
    }

    /// Count one request for `key`.
    pub fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        let allowed = entry.count < self.limit;
        if allowed {
            entry.count += 1;
        }

        Decision {
            allowed,
            limit: self.limit,
            remaining: self.limit.saturating_sub(entry.count),
            reset: self.window.saturating_sub(now.duration_since(entry.started)),
        }
    }
}

/// The three limiters the routes use
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub public: Arc<RateLimiter>,
    pub admin: Arc<RateLimiter>,
    pub comments: Arc<RateLimiter>,
}

impl RateLimits {
    pub fn new(config: &RateLimitConfig) -> Self {
        let limiter = |limit: u32, window: Duration, message: &'static str| {
            Arc::new(RateLimiter::new(limit, window, message).trusting_proxy(config.trust_proxy))
        };
        Self {
            public: limiter(
                config.max_requests,
                config.window,
                "Too many requests from this IP, please try again later.",
            ),
            admin: limiter(
                config.admin_max_requests,
                config.window,
                "Too many requests, please try again later.",
            ),
            comments: limiter(
                COMMENT_MAX,
                COMMENT_WINDOW,
                "Too many comments. Please try again later.",
            ),
        }
    }
}

/// Middleware: count the request against the limiter in state.
///
/// Use with `axum::middleware::from_fn_with_state(limiter, enforce)`.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = limiter.key_for(&request);
    let decision = limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, limit = decision.limit, "rate limit exceeded");
        ApiError::RateLimited {
            message: limiter.message,
            retry_after_secs: decision.reset_secs(),
        }
        .into_response()
    };
    decision.apply(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_the_limit() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60), "slow down");

        let first = limiter.check("1.2.3.4");
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        assert!(limiter.check("1.2.3.4").allowed);
        let third = limiter.check("1.2.3.4");
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);

        // other clients have their own window
        assert!(limiter.check("5.6.7.8").allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), "slow down");
        assert!(limiter.check("a").allowed);
        assert!(!limiter.check("a").allowed);

        tokio::time::advance(Duration::from_secs(30)).await;
        let blocked = limiter.check("a");
        assert!(!blocked.allowed);
        assert_eq!(blocked.reset, Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(limiter.check("a").allowed);
    }

    #[test]
    fn reset_rounds_up() {
        let decision = Decision {
            allowed: true,
            limit: 5,
            remaining: 4,
            reset: Duration::from_millis(1500),
        };
        assert_eq!(decision.reset_secs(), 2);

        let mut headers = HeaderMap::new();
        decision.apply(&mut headers);
        assert_eq!(headers["ratelimit-limit"], "5");
        assert_eq!(headers["ratelimit-remaining"], "4");
        assert_eq!(headers["ratelimit-reset"], "2");
    }

    fn request_from(peer: [u8; 4], forwarded_for: &str) -> Request {
        let mut request = axum::http::Request::builder()
            .header("x-forwarded-for", forwarded_for)
            .body(axum::body::Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(axum::extract::ConnectInfo(std::net::SocketAddr::from((peer, 4000))));
        request
    }

    #[test]
    fn keys_on_the_peer_unless_the_proxy_is_trusted() {
        let request = request_from([192, 0, 2, 1], "203.0.113.9");

        let limiter = RateLimiter::new(1, Duration::from_secs(60), "slow down");
        assert_eq!(limiter.key_for(&request), "192.0.2.1");

        let behind_proxy = RateLimiter::new(1, Duration::from_secs(60), "slow down").trusting_proxy(true);
        assert_eq!(behind_proxy.key_for(&request), "203.0.113.9");

        let bare = axum::http::Request::new(axum::body::Body::empty());
        assert_eq!(limiter.key_for(&bare), UNKNOWN_CLIENT);
    }

    #[test]
    fn comment_limiter_is_five_per_hour() {
        let limits = RateLimits::new(&RateLimitConfig::default());
        assert_eq!(limits.comments.limit, 5);
        assert_eq!(limits.comments.window, Duration::from_secs(3600));
        assert_eq!(limits.public.limit, 100);
        assert_eq!(limits.admin.limit, 50);
        assert!(!limits.public.trust_proxy);
    }
}
