//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{code}`      - Short link redirect (public)
//! - `/api/*`            - REST API, see [`crate::api::routes`]
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **CORS** - Browser origins allowed to call the API
//! - **Security headers** - Framing, sniffing, CSP, referrer and HSTS
//! - **Timeout** - Whole-request deadline
//! - **Authentication** - Optional Bearer token on `/api`
//! - **Path normalization** - Trailing slash handling

use std::time::Duration;

use crate::api;
use crate::api::handlers::redirect_handler;
use crate::api::middleware::security::{self, BrowserPolicy};
use crate::api::middleware::{auth, tracing};
use crate::state::AppState;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Router, middleware};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::timeout::TimeoutLayer;

/// HTTP-level settings that do not belong in [`AppState`].
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Requests running longer than this are answered with `408`.
    pub request_timeout: Duration,
    pub browser: BrowserPolicy,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            browser: BrowserPolicy::default(),
        }
    }
}

/// The full application as served, trailing slashes trimmed before routing.
pub type NormalizedRouter = NormalizePath<Router>;

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState, options: &RouterOptions) -> NormalizedRouter {
    NormalizePathLayer::trim_trailing_slash().layer(router(state, options))
}

/// The routes and middleware without path normalization.
pub fn router(state: AppState, options: &RouterOptions) -> Router {
    let api_router = api::routes::api_routes(&state)
        .layer(middleware::from_fn_with_state(state.clone(), auth::layer));

    let app = Router::new()
        .route("/{code}", get(redirect_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            options.request_timeout,
        ))
        .layer(security::cors_layer(&options.browser));

    security::with_security_headers(app, options.browser.hsts).layer(tracing::layer())
}
