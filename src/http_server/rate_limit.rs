//! Per-client request limiting
//!
//! Each client IP owns a token bucket holding `requests` tokens that refill
//! evenly over `window`. Requests without a known peer address share one
//! bucket.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};

use crate::auth::errors::AuthError;

use super::response::ApiError;

/// Shared limiter keyed by client IP
pub type ClientLimiter = DefaultKeyedRateLimiter<IpAddr>;

/// Request budget per client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub window: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimit {
    /// Bucket of `requests` tokens, one token back every `window / requests`
    ///
    /// `None` when the budget cannot be expressed, e.g. zero requests.
    pub fn quota(&self) -> Option<Quota> {
        let burst = NonZeroU32::new(self.requests)?;
        Some(Quota::with_period(self.window / self.requests)?.allow_burst(burst))
    }

    pub fn limiter(&self) -> Option<Arc<ClientLimiter>> {
        self.quota().map(|quota| Arc::new(RateLimiter::keyed(quota)))
    }
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Reject requests over the caller's budget with 429 and `Retry-After`
pub async fn limit_by_ip(
    State(limiter): State<Arc<ClientLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    if let Err(not_until) = limiter.check_key(&ip) {
        let wait = not_until.wait_time_from(DefaultClock::default().now());
        tracing::warn!(%ip, retry_after_ms = wait.as_millis() as u64, "rate limit exceeded");

        let mut response = ApiError(AuthError::RateLimited).into_response();
        let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}
