//! Bearer token authentication middleware.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBearer;
use serde_json::json;

use crate::domain::entities::Caller;
use crate::{error::AppError, state::AppState};

/// Resolves the caller from an optional Bearer token.
///
/// # Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// Requests without an `Authorization` header continue anonymously. When the header is
/// present, the token must be well-formed, known and not revoked; the resolved
/// [`Caller`] is then stored in the request extensions for [`MaybeCaller`].
///
/// # Errors
///
/// Returns `401 Unauthorized` (with `WWW-Authenticate: Bearer`) if the header is malformed
/// or the token is unknown or revoked.
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !req.headers().contains_key(header::AUTHORIZATION) {
        return Ok(next.run(req).await);
    }

    let (mut parts, body) = req.into_parts();

    let AuthBearer(token) = AuthBearer::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| {
            AppError::unauthorized(
                "Unauthorized",
                json!({"reason": "Authorization header is missing or invalid"}),
            )
        })?;

    let caller = st.auth_service.authenticate(&token).await?;
    parts.extensions.insert(caller);

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// The authenticated caller, if [`layer`] resolved one.
#[derive(Debug, Clone)]
pub struct MaybeCaller(pub Option<Caller>);

impl MaybeCaller {
    pub fn owner_id(&self) -> Option<&str> {
        self.0.as_ref().map(|caller| caller.owner_id.as_str())
    }

    /// Requires an authenticated caller.
    pub fn required(self) -> Result<Caller, AppError> {
        self.0.ok_or_else(|| {
            AppError::unauthorized(
                "Unauthorized",
                json!({"reason": "A Bearer token is required"}),
            )
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for MaybeCaller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Caller>().cloned()))
    }
}
