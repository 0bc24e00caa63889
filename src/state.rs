//! Shared application state injected into every handler.

use std::sync::Arc;
use std::time::Duration;

use crate::application::services::{DynAuthService, DynLinkService, RateLimiter};
use crate::domain::click_event::ClickSender;
use crate::utils::url_validator::UrlValidator;

/// Per-path limit applied to `GET /api/urls/{code}`.
#[derive(Debug, Clone, Copy)]
pub struct LookupLimit {
    pub limit: u64,
    pub window: Duration,
}

/// Everything a request needs, built once at startup.
///
/// Cloning is cheap. The click worker stops once every clone (and with it every
/// [`ClickSender`]) has been dropped.
#[derive(Clone)]
pub struct AppState {
    pub link_service: Arc<DynLinkService>,
    pub auth_service: Arc<DynAuthService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub url_validator: Arc<UrlValidator>,
    pub click_sender: ClickSender,
    /// Prefix for rendered short URLs, without a trailing slash.
    pub base_url: Arc<str>,
    pub behind_proxy: bool,
    pub lookup_limit: LookupLimit,
}

impl AppState {
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }
}

/// Strips trailing slashes so `short_url` never doubles them.
pub fn normalize_base_url(base_url: &str) -> Arc<str> {
    Arc::from(base_url.trim_end_matches('/'))
}
