//! Handler for link creation.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use validator::Validate;

use crate::api::dto::shorten::{LinkResponse, ShortenRequest};
use crate::api::middleware::auth::MaybeCaller;
use crate::api::middleware::rate_limit::{RateLimitHeaders, too_many_requests};
use crate::application::services::RateLimitIdentity;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_ip::ClientIp;

/// Creates a short link.
///
/// # Endpoint
///
/// `POST /api/urls`
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/some/page",
///   "is_public": true,     // optional, default true
///   "code_length": 8       // optional, 6..=12
/// }
/// ```
///
/// # Flow
///
/// 1. The destination is validated; rejected URLs do not count against the limit
/// 2. The caller's tiered rate limit is charged
/// 3. The link is created, or the existing anonymous link for the destination returned
///
/// # Response
///
/// `201 Created` with a [`LinkResponse`] and `X-RateLimit-*` headers.
///
/// # Errors
///
/// - `400` on a malformed body, invalid input or a destination rejected by policy
/// - `401` on an invalid Bearer token
/// - `429` when the caller's limit is exhausted
/// - `500` on store failures or when no unique code could be allocated
pub async fn shorten_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    caller: MaybeCaller,
    payload: Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let destination = state.url_validator.validate(&payload.url)?;

    let identity = RateLimitIdentity::from_caller(caller.0.as_ref(), ip);
    let decision = state.rate_limiter.check(&identity).await;
    if decision.exceeded {
        return Ok(too_many_requests(&decision));
    }

    let link = state
        .link_service
        .create(
            &destination,
            caller.owner_id(),
            payload.is_public,
            payload.code_length,
        )
        .await?;

    let short_url = state.short_url(&link.code);

    Ok((
        StatusCode::CREATED,
        RateLimitHeaders::from(&decision),
        Json(LinkResponse::new(link, short_url)),
    )
        .into_response())
}
