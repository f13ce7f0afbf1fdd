use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use serde_json::json;
use std::{net::IpAddr, net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};
use tracing::warn;

/// Per-IP sliding-window limiter keyed by `RATE_LIMIT_WINDOW_MS` /
/// `RATE_LIMIT_MAX_REQUESTS`. Uncounted proxy setups collapse to the
/// connection's peer address.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>>,
}

impl RateLimitState {
    pub fn new(window_ms: u64, max_requests: u32) -> Self {
        let max_requests = NonZeroU32::new(max_requests.max(1)).unwrap();
        let quota = Quota::with_period(Duration::from_millis(window_ms))
            .unwrap_or_else(|| Quota::per_minute(max_requests))
            .allow_burst(max_requests);
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    fn check(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }
}

pub fn extract_client_ip(headers: &axum::http::HeaderMap, fallback: IpAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
        })
        .unwrap_or(fallback)
}

pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(request.headers(), addr.ip());

    if state.check(ip) {
        Ok(next.run(request).await)
    } else {
        warn!(%ip, path = %request.uri().path(), "rate limit exceeded");
        Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": "Too Many Requests"})),
        )
            .into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn allows_requests_within_quota() {
        let state = RateLimitState::new(60_000, 3);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        assert!(state.check(ip));
        assert!(state.check(ip));
        assert!(state.check(ip));
        assert!(!state.check(ip));
    }

    #[test]
    fn tracks_ips_independently() {
        let state = RateLimitState::new(60_000, 1);
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        assert!(state.check(a));
        assert!(!state.check(a));
        assert!(state.check(b));
    }

    #[test]
    fn extracts_ip_from_forwarded_for() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.5, 10.0.0.1".parse().unwrap());
        let fallback = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));

        assert_eq!(
            extract_client_ip(&headers, fallback),
            IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5))
        );
    }
}
