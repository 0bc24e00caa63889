//! Repository trait for API token authentication.

use crate::domain::entities::Tier;
use crate::domain::repositories::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// API token entity with metadata.
///
/// Only the HMAC-SHA256 hash of a token is ever stored.
#[derive(Debug, Clone)]
pub struct ApiToken {
    pub id: i64,
    pub name: String,
    pub owner_id: String,
    pub tier: Tier,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiToken {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Input data for issuing a token.
#[derive(Debug, Clone)]
pub struct NewApiToken {
    pub name: String,
    pub owner_id: String,
    pub tier: Tier,
    pub token_hash: String,
}

/// Repository interface for API token management.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgTokenRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Looks up a non-revoked token by hash.
    async fn find_active(&self, token_hash: &str) -> StoreResult<Option<ApiToken>>;

    /// Updates the `last_used_at` timestamp for a token.
    async fn update_last_used(&self, token_hash: &str) -> StoreResult<()>;

    /// # Errors
    ///
    /// Returns [`crate::domain::repositories::StoreError::UniqueViolation`] if the name or
    /// hash is already taken.
    async fn create_token(&self, new_token: NewApiToken) -> StoreResult<ApiToken>;

    async fn list_tokens(&self) -> StoreResult<Vec<ApiToken>>;

    /// Sets `revoked_at`. Returns `false` if the token does not exist or is already revoked.
    async fn revoke_token(&self, id: i64) -> StoreResult<bool>;
}
