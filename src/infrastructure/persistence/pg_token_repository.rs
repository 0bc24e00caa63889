//! PostgreSQL implementation of token repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::Tier;
use crate::domain::repositories::{ApiToken, NewApiToken, StoreResult, TokenRepository};

const FIND_ACTIVE: &str = r#"
    SELECT id, name, owner_id, tier, token_hash, created_at, last_used_at, revoked_at
    FROM api_tokens
    WHERE token_hash = $1
      AND revoked_at IS NULL
"#;

const INSERT_TOKEN: &str = r#"
    INSERT INTO api_tokens (name, owner_id, tier, token_hash)
    VALUES ($1, $2, $3, $4)
    RETURNING id, name, owner_id, tier, token_hash, created_at, last_used_at, revoked_at
"#;

const LIST_TOKENS: &str = r#"
    SELECT id, name, owner_id, tier, token_hash, created_at, last_used_at, revoked_at
    FROM api_tokens
    ORDER BY created_at DESC
"#;

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    name: String,
    owner_id: String,
    tier: String,
    token_hash: String,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<TokenRow> for ApiToken {
    fn from(row: TokenRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            tier: row.tier.parse().unwrap_or(Tier::Unknown),
            token_hash: row.token_hash,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            revoked_at: row.revoked_at,
        }
    }
}

/// PostgreSQL repository for API token storage and validation.
///
/// Stores HMAC-SHA256 hashes only. Raw tokens are never persisted.
pub struct PgTokenRepository {
    pool: Arc<PgPool>,
}

impl PgTokenRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn find_active(&self, token_hash: &str) -> StoreResult<Option<ApiToken>> {
        let row = sqlx::query_as::<_, TokenRow>(FIND_ACTIVE)
        .bind(token_hash)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(ApiToken::from))
    }

    async fn update_last_used(&self, token_hash: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE api_tokens
            SET last_used_at = NOW()
            WHERE token_hash = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_token(&self, new_token: NewApiToken) -> StoreResult<ApiToken> {
        let row = sqlx::query_as::<_, TokenRow>(INSERT_TOKEN)
        .bind(&new_token.name)
        .bind(&new_token.owner_id)
        .bind(new_token.tier.as_str())
        .bind(&new_token.token_hash)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn list_tokens(&self) -> StoreResult<Vec<ApiToken>> {
        let rows = sqlx::query_as::<_, TokenRow>(LIST_TOKENS)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(ApiToken::from).collect())
    }

    async fn revoke_token(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE api_tokens
            SET revoked_at = NOW()
            WHERE id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
