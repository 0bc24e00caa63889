//! API route configuration.
//!
//! Authentication is optional at this level: [`crate::api::middleware::auth::layer`]
//! resolves a caller when a Bearer token is sent, and handlers decide whether one is
//! required.

use crate::api::handlers::{
    get_link_handler, health_handler, list_links_handler, shorten_handler,
};
use crate::api::middleware::rate_limit;
use crate::state::AppState;
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// All `/api` routes.
///
/// # Endpoints
///
/// - `POST /urls`          - Create a short link (tiered rate limit)
/// - `GET  /urls`          - List the caller's links (Bearer token required)
/// - `GET  /urls/{code}`   - Look up a link (per-path lookup limit)
/// - `GET  /health`        - Health check: DB, cache, click queue
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/urls", post(shorten_handler).get(list_links_handler))
        .route(
            "/urls/{code}",
            get(get_link_handler).route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit::lookup_layer,
            )),
        )
        .route("/health", get(health_handler))
}
