//! PostgreSQL implementation of link repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{Link, NewLink, Visibility};
use crate::domain::repositories::{LinkRepository, StoreResult};

const INSERT_LINK: &str = r#"
    INSERT INTO links (code, destination, owner_id, is_public)
    VALUES ($1, $2, $3, $4)
    RETURNING id, code, destination, owner_id, is_public, click_count, created_at
"#;

const FIND_BY_CODE: &str = r#"
    SELECT id, code, destination, owner_id, is_public, click_count, created_at
    FROM links
    WHERE code = $1
"#;

const FIND_ANONYMOUS_BY_DESTINATION: &str = r#"
    SELECT id, code, destination, owner_id, is_public, click_count, created_at
    FROM links
    WHERE destination = $1 AND owner_id IS NULL
    ORDER BY created_at ASC, id ASC
    LIMIT 1
"#;

const LIST_BY_OWNER: &str = r#"
    SELECT id, code, destination, owner_id, is_public, click_count, created_at
    FROM links
    WHERE owner_id = $1
    ORDER BY created_at DESC, id DESC
    LIMIT $2 OFFSET $3
"#;

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: i64,
    code: String,
    destination: String,
    owner_id: Option<String>,
    is_public: bool,
    click_count: i64,
    created_at: DateTime<Utc>,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            destination: row.destination,
            owner: row.owner_id,
            visibility: Visibility::from_public_flag(row.is_public),
            click_count: row.click_count,
            created_at: row.created_at,
        }
    }
}

/// Totals reported by `admin stats`.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct LinkSummary {
    pub links: i64,
    pub anonymous: i64,
    pub private: i64,
    pub clicks: i64,
}

/// PostgreSQL repository for link storage and retrieval.
///
/// Code uniqueness is enforced by the `links_code_key` constraint; a violation surfaces
/// as [`crate::domain::repositories::StoreError::UniqueViolation`].
pub struct PgLinkRepository {
    pool: Arc<PgPool>,
}

impl PgLinkRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn summary(&self) -> StoreResult<LinkSummary> {
        let summary = sqlx::query_as::<_, LinkSummary>(
            r#"
            SELECT
                COUNT(*)                                       AS links,
                COUNT(*) FILTER (WHERE owner_id IS NULL)       AS anonymous,
                COUNT(*) FILTER (WHERE NOT is_public)          AS private,
                COALESCE(SUM(click_count), 0)::BIGINT          AS clicks
            FROM links
            "#,
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(summary)
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn create(&self, new_link: NewLink) -> StoreResult<Link> {
        let row = sqlx::query_as::<_, LinkRow>(INSERT_LINK)
        .bind(&new_link.code)
        .bind(&new_link.destination)
        .bind(&new_link.owner)
        .bind(new_link.visibility.is_public())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Link>> {
        let row = sqlx::query_as::<_, LinkRow>(FIND_BY_CODE)
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Link::from))
    }

    async fn find_by_destination(&self, destination: &str) -> StoreResult<Option<Link>> {
        let row = sqlx::query_as::<_, LinkRow>(FIND_ANONYMOUS_BY_DESTINATION)
        .bind(destination)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Link::from))
    }

    async fn list_by_owner(
        &self,
        owner: &str,
        page: i64,
        page_size: i64,
    ) -> StoreResult<Vec<Link>> {
        let offset = (page.max(1) - 1) * page_size;

        let rows = sqlx::query_as::<_, LinkRow>(LIST_BY_OWNER)
        .bind(owner)
        .bind(page_size)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Link::from).collect())
    }

    async fn count_by_owner(&self, owner: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links WHERE owner_id = $1")
            .bind(owner)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn increment_clicks(&self, code: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE links SET click_count = click_count + 1 WHERE code = $1")
            .bind(code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}
