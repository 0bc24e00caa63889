//! CORS and browser security headers.
//!
//! Both are applied outside the API routes so preflight requests and error responses
//! carry them too.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::middleware::rate_limit::{LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER};

pub const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'";
pub const STRICT_TRANSPORT_SECURITY: &str = "max-age=31536000; includeSubDomains; preload";
pub const REFERRER_POLICY: &str = "strict-origin-when-cross-origin";

/// Which browser origins may call the API, and whether HSTS is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserPolicy {
    /// Exact origins (`https://app.example.com`) or `*` for any. Empty disables CORS.
    pub allowed_origins: Vec<String>,
    pub max_age: Duration,
    /// Only meaningful when the service is reached over HTTPS.
    pub hsts: bool,
}

impl Default for BrowserPolicy {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            max_age: Duration::from_secs(3600),
            hsts: true,
        }
    }
}

impl BrowserPolicy {
    fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

/// CORS for the browser frontend.
///
/// Tokens travel in the `Authorization` header, never in cookies, so credentials are not
/// enabled and a wildcard origin is safe to send.
pub fn cors_layer(policy: &BrowserPolicy) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([
            header::RETRY_AFTER,
            HeaderName::from_static(LIMIT_HEADER),
            HeaderName::from_static(REMAINING_HEADER),
            HeaderName::from_static(RESET_HEADER),
        ])
        .max_age(policy.max_age);

    if policy.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = policy
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        layer
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Adds the security headers to every response that does not set them itself.
pub fn with_security_headers(router: Router, hsts: bool) -> Router {
    let router = router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static(REFERRER_POLICY),
        ));

    if hsts {
        router.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(STRICT_TRANSPORT_SECURITY),
        ))
    } else {
        router
    }
}
