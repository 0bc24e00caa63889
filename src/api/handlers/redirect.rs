//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its destination.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Request Flow
///
/// 1. Resolve the code through the link service (cache hint, store confirmation)
/// 2. Queue a click event for the background worker
/// 3. Return `302 Found` with `Location`
///
/// # Click Tracking
///
/// Clicks are sent to a bounded channel with `try_send`. If the queue is full the click
/// is dropped; the redirect never waits on the store write.
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist or is malformed.
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let link = state.link_service.resolve(&code).await?;

    state.click_sender.record(&link.code);

    let location = HeaderValue::try_from(link.destination.as_str()).map_err(|_| {
        tracing::error!(code = %link.code, "Stored destination is not a valid header value");
        AppError::internal("Failed to resolve short link", serde_json::json!({}))
    })?;

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
