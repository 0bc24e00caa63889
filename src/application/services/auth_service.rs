//! Authentication service for API token validation.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::warn;

use crate::domain::entities::Caller;
use crate::domain::repositories::TokenRepository;
use crate::error::AppError;
use serde_json::json;

type HmacSha256 = Hmac<Sha256>;

/// Hashes a raw token with HMAC-SHA256 keyed by the server signing secret.
///
/// Returns a 64-character lowercase hex-encoded MAC. The admin CLI uses the same function
/// when issuing tokens, so both sides must share `TOKEN_SIGNING_SECRET`.
pub fn hash_token(signing_secret: &str, token: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Resolves bearer tokens to callers.
///
/// An attacker with read-only access to the database cannot verify or forge tokens
/// without the server-side secret.
pub struct AuthService<R: TokenRepository + ?Sized> {
    repository: Arc<R>,
    signing_secret: String,
}

pub type DynAuthService = AuthService<dyn TokenRepository>;

impl<R: TokenRepository + ?Sized> AuthService<R> {
    /// `signing_secret` must match the value used when tokens were created.
    pub fn new(repository: Arc<R>, signing_secret: String) -> Self {
        Self {
            repository,
            signing_secret,
        }
    }

    /// Authenticates a raw token and returns the caller it belongs to.
    ///
    /// Updates `last_used_at` on success; a failure there is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] if the token is unknown or revoked, and
    /// [`AppError::Internal`] on store errors.
    pub async fn authenticate(&self, token: &str) -> Result<Caller, AppError> {
        let token_hash = hash_token(&self.signing_secret, token);

        let api_token = self
            .repository
            .find_active(&token_hash)
            .await
            .map_err(|e| AppError::from_store(&e, "Failed to authenticate"))?
            .ok_or_else(|| {
                AppError::unauthorized(
                    "Unauthorized",
                    json!({"reason": "Invalid or revoked token"}),
                )
            })?;

        if let Err(e) = self.repository.update_last_used(&token_hash).await {
            warn!(error = %e, token = %api_token.name, "Failed to update token last_used_at");
        }

        Ok(Caller {
            owner_id: api_token.owner_id,
            tier: api_token.tier,
        })
    }
}
