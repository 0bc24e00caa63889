//! Repository trait for short link data access.

use crate::domain::entities::{Link, NewLink};
use async_trait::async_trait;

/// Typed outcome of store operations.
///
/// The service retries on [`StoreError::UniqueViolation`] and treats everything else as
/// fatal for the current request.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("short code already exists")]
    UniqueViolation,

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Authoritative storage for links.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLinkRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Persists a new link and returns it with its store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniqueViolation`] if the code is already taken.
    async fn create(&self, new_link: NewLink) -> StoreResult<Link>;

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Link>>;

    /// Finds the oldest anonymous link for a destination. Owned links never match.
    async fn find_by_destination(&self, destination: &str) -> StoreResult<Option<Link>>;

    /// Lists an owner's links, newest first.
    ///
    /// `page` is 1-indexed.
    async fn list_by_owner(&self, owner: &str, page: i64, page_size: i64)
    -> StoreResult<Vec<Link>>;

    async fn count_by_owner(&self, owner: &str) -> StoreResult<i64>;

    /// Adds one click. Returns `false` when no link has this code.
    async fn increment_clicks(&self, code: &str) -> StoreResult<bool>;

    async fn health_check(&self) -> bool;
}
