//! Business logic services for the application layer.

pub mod auth_service;
pub mod link_service;
pub mod rate_limiter;

pub use auth_service::{AuthService, DynAuthService};
pub use link_service::{DynLinkService, LinkCacheTtl, LinkPage, LinkService};
pub use rate_limiter::{RateLimitDecision, RateLimitIdentity, RateLimitPolicy, RateLimiter};
