//! Rate limit enforcement helpers and the per-path lookup limiter.
//!
//! Counting happens in [`crate::application::services::RateLimiter`]; this module turns a
//! decision into response headers or a `429 Too Many Requests`.

use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, IntoResponseParts, Response, ResponseParts},
};
use std::convert::Infallible;

use crate::api::middleware::auth::MaybeCaller;
use crate::application::services::{RateLimitDecision, RateLimitIdentity};
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_ip::ClientIp;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset` (unix seconds).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitHeaders {
    limit: u64,
    remaining: u64,
    reset: i64,
}

impl From<&RateLimitDecision> for RateLimitHeaders {
    fn from(decision: &RateLimitDecision) -> Self {
        Self {
            limit: decision.limit,
            remaining: decision.remaining,
            reset: decision.reset_at.timestamp(),
        }
    }
}

impl IntoResponseParts for RateLimitHeaders {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let headers = res.headers_mut();
        headers.insert(LIMIT_HEADER, HeaderValue::from(self.limit));
        headers.insert(REMAINING_HEADER, HeaderValue::from(self.remaining));
        headers.insert(RESET_HEADER, HeaderValue::from(self.reset));
        Ok(res)
    }
}

/// The `429` for an exceeded decision, with `Retry-After` and the configured limit.
pub fn too_many_requests(decision: &RateLimitDecision) -> Response {
    let error = AppError::RateLimited {
        retry_after: decision.retry_after_secs(),
        limit: decision.limit,
    };

    (RateLimitHeaders::from(decision), error).into_response()
}

/// Applies the lookup limit to the wrapped route.
///
/// Keyed on the route template, so every code shares one budget per caller.
pub async fn lookup_layer(
    State(st): State<AppState>,
    ClientIp(ip): ClientIp,
    caller: MaybeCaller,
    req: Request,
    next: Next,
) -> Response {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| req.uri().path())
        .to_string();

    let identity = RateLimitIdentity::from_caller(caller.0.as_ref(), ip);
    let decision = st
        .rate_limiter
        .check_custom(
            &identity,
            &path,
            st.lookup_limit.limit,
            st.lookup_limit.window,
        )
        .await;

    if decision.exceeded {
        return too_many_requests(&decision);
    }

    (RateLimitHeaders::from(&decision), next.run(req).await).into_response()
}
