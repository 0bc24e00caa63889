//! Application layer services implementing business logic.
//!
//! Services consume repository traits and the cache abstraction and give HTTP handlers a
//! small API.
//!
//! - [`services::link_service::LinkService`] - Short link creation, resolution and listing
//! - [`services::rate_limiter::RateLimiter`] - Tiered fixed-window request governor
//! - [`services::auth_service::AuthService`] - API token authentication

pub mod services;
