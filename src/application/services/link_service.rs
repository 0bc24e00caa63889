//! Link creation and resolution service.
//!
//! Owns the collision-retry loop and the cache-aside policy. The store is always the
//! source of truth: cache hits are treated as hints, cache failures as misses.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::domain::entities::{Link, NewLink, Visibility};
use crate::domain::repositories::{LinkRepository, StoreError, StoreResult};
use crate::error::AppError;
use crate::infrastructure::cache::{CacheService, keys};
use crate::utils::code_generator::{CodeLength, ShortcodeGenerator, is_valid_code};
use crate::utils::url_validator::ValidatedUrl;

/// Code allocation attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// TTLs for the two cached relations.
#[derive(Debug, Clone, Copy)]
pub struct LinkCacheTtl {
    /// `short:{code}` → destination.
    pub code: Duration,
    /// `url:{destination}` → code, anonymous links only.
    pub destination: Duration,
}

impl Default for LinkCacheTtl {
    fn default() -> Self {
        Self {
            code: Duration::from_secs(24 * 60 * 60),
            destination: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// One page of an owner's links.
#[derive(Debug, Clone)]
pub struct LinkPage {
    pub items: Vec<Link>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Service for creating and resolving short links.
pub struct LinkService<L: LinkRepository + ?Sized> {
    repository: Arc<L>,
    cache: Arc<dyn CacheService>,
    generator: Arc<ShortcodeGenerator>,
    ttl: LinkCacheTtl,
    max_attempts: usize,
}

pub type DynLinkService = LinkService<dyn LinkRepository>;

impl<L: LinkRepository + ?Sized> LinkService<L> {
    pub fn new(
        repository: Arc<L>,
        cache: Arc<dyn CacheService>,
        generator: Arc<ShortcodeGenerator>,
        ttl: LinkCacheTtl,
    ) -> Self {
        Self {
            repository,
            cache,
            generator,
            ttl,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Creates a short link, or returns the existing anonymous link for the destination.
    ///
    /// Blank owners count as anonymous. `length` falls back to the default when unset or
    /// outside `[6, 12]`.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] when a private link has no owner
    /// - [`AppError::CodeAllocationExhausted`] when every attempt collided
    /// - [`AppError::Internal`] on any other store error
    pub async fn create(
        &self,
        destination: &ValidatedUrl,
        owner: Option<&str>,
        is_public: bool,
        length: Option<usize>,
    ) -> Result<Link, AppError> {
        let owner = owner.map(str::trim).filter(|o| !o.is_empty());

        if !is_public && owner.is_none() {
            return Err(AppError::bad_request(
                "Private links require an authenticated owner",
                json!({ "reason": "private_requires_owner" }),
            ));
        }

        let url = destination.as_str();

        if owner.is_none()
            && let Some(existing) = self.find_anonymous(url).await?
        {
            debug!(code = %existing.code, "Reusing anonymous link");
            return Ok(existing);
        }

        let length = CodeLength::or_default(length);
        let visibility = Visibility::from_public_flag(is_public);

        for attempt in 1..=self.max_attempts {
            let new_link = NewLink {
                code: self.generator.generate(url, length),
                destination: url.to_string(),
                owner: owner.map(str::to_string),
                visibility,
            };

            match self.repository.create(new_link).await {
                Ok(link) => {
                    metrics::counter!("links_created_total").increment(1);
                    info!(code = %link.code, attempt, "Short link created");
                    self.cache_link(&link).await;
                    return Ok(link);
                }
                Err(StoreError::UniqueViolation) => {
                    metrics::counter!("shortcode_collisions_total").increment(1);
                    warn!(attempt, "Short code collision, regenerating");
                }
                Err(e) => return Err(AppError::from_store(&e, "Failed to create short link")),
            }
        }

        error!(
            attempts = self.max_attempts,
            "Exhausted short code allocation attempts"
        );
        Err(AppError::CodeAllocationExhausted)
    }

    /// Resolves a code to its current link.
    ///
    /// Malformed codes are rejected without touching the store. Misses are not cached.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown codes, [`AppError::Internal`] on store
    /// errors.
    pub async fn resolve(&self, code: &str) -> Result<Link, AppError> {
        if !is_valid_code(code) {
            return Err(not_found(code));
        }

        let hint = self.cache_get(&keys::short_code(code)).await;

        let link = self
            .repository
            .find_by_code(code)
            .await
            .map_err(|e| AppError::from_store(&e, "Failed to resolve short link"))?
            .ok_or_else(|| not_found(code))?;

        if hint.as_deref() != Some(link.destination.as_str()) {
            self.cache_put(&keys::short_code(&link.code), &link.destination, self.ttl.code)
                .await;
        }

        Ok(link)
    }

    /// Adds one click in the store. Returns `false` for unknown codes.
    ///
    /// Called from the click worker, which owns retries.
    pub async fn increment_click(&self, code: &str) -> StoreResult<bool> {
        self.repository.increment_clicks(code).await
    }

    /// Lists an owner's links, newest first. Never served from cache.
    pub async fn list_by_owner(
        &self,
        owner: &str,
        page: i64,
        page_size: i64,
    ) -> Result<LinkPage, AppError> {
        let items = self
            .repository
            .list_by_owner(owner, page, page_size)
            .await
            .map_err(|e| AppError::from_store(&e, "Failed to list links"))?;

        let total = self
            .repository
            .count_by_owner(owner)
            .await
            .map_err(|e| AppError::from_store(&e, "Failed to list links"))?;

        Ok(LinkPage {
            items,
            total,
            page,
            page_size,
        })
    }

    pub async fn store_healthy(&self) -> bool {
        self.repository.health_check().await
    }

    pub async fn cache_healthy(&self) -> bool {
        self.cache.health_check().await
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend()
    }

    /// Cached code first, confirmed against the store; then the store's own lookup.
    async fn find_anonymous(&self, url: &str) -> Result<Option<Link>, AppError> {
        if let Some(code) = self.cache_get(&keys::destination(url)).await {
            let cached = self
                .repository
                .find_by_code(&code)
                .await
                .map_err(|e| AppError::from_store(&e, "Failed to create short link"))?;

            match cached {
                Some(link) if link.is_anonymous() && link.destination == url => {
                    return Ok(Some(link));
                }
                _ => debug!(code = %code, "Stale destination cache entry"),
            }
        }

        let existing = self
            .repository
            .find_by_destination(url)
            .await
            .map_err(|e| AppError::from_store(&e, "Failed to create short link"))?;

        if let Some(link) = &existing {
            self.cache_link(link).await;
        }

        Ok(existing)
    }

    async fn cache_link(&self, link: &Link) {
        self.cache_put(&keys::short_code(&link.code), &link.destination, self.ttl.code)
            .await;

        if link.is_anonymous() {
            self.cache_put(
                &keys::destination(&link.destination),
                &link.code,
                self.ttl.destination,
            )
            .await;
        }
    }

    async fn cache_get(&self, key: &str) -> Option<String> {
        match self.cache.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                metrics::counter!("cache_errors_total").increment(1);
                None
            }
        }
    }

    async fn cache_put(&self, key: &str, value: &str, ttl: Duration) {
        if let Err(e) = self.cache.set(key, value, ttl).await {
            warn!(key, error = %e, "Cache write failed");
            metrics::counter!("cache_errors_total").increment(1);
        }
    }
}

fn not_found(code: &str) -> AppError {
    AppError::not_found("Short link not found", json!({ "code": code }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockLinkRepository;
    use crate::infrastructure::cache::{CacheError, CacheResult, MemoryCache, NullCache};
    use crate::utils::url_validator::{UrlPolicy, UrlValidator};
    use async_trait::async_trait;
    use chrono::Utc;

    const SALT: &str = "0123456789abcdef0123456789abcdef";
    const URL: &str = "https://example.com/page";

    struct FailingCache;

    #[async_trait]
    impl CacheService for FailingCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::Timeout)
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Timeout)
        }
        async fn incr(&self, _key: &str) -> CacheResult<i64> {
            Err(CacheError::Timeout)
        }
        async fn expire(&self, _key: &str, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Timeout)
        }
        async fn ttl(&self, _key: &str) -> CacheResult<Option<Duration>> {
            Err(CacheError::Timeout)
        }
        async fn health_check(&self) -> bool {
            false
        }
        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    fn validated(url: &str) -> ValidatedUrl {
        UrlValidator::new(UrlPolicy::default())
            .unwrap()
            .validate(url)
            .unwrap()
    }

    fn persisted(id: i64, new_link: NewLink) -> Link {
        Link {
            id,
            code: new_link.code,
            destination: new_link.destination,
            owner: new_link.owner,
            visibility: new_link.visibility,
            click_count: 0,
            created_at: Utc::now(),
        }
    }

    fn link(code: &str, destination: &str, owner: Option<&str>) -> Link {
        Link {
            id: 7,
            code: code.to_string(),
            destination: destination.to_string(),
            owner: owner.map(str::to_string),
            visibility: Visibility::Public,
            click_count: 3,
            created_at: Utc::now(),
        }
    }

    fn service(repo: MockLinkRepository, cache: Arc<dyn CacheService>) -> LinkService<MockLinkRepository> {
        LinkService::new(
            Arc::new(repo),
            cache,
            Arc::new(ShortcodeGenerator::new(SALT).unwrap()),
            LinkCacheTtl::default(),
        )
    }

    #[tokio::test]
    async fn test_private_link_requires_owner() {
        let mut repo = MockLinkRepository::new();
        repo.expect_create().never();
        repo.expect_find_by_destination().never();

        let service = service(repo, Arc::new(NullCache::new()));
        let err = service
            .create(&validated(URL), None, false, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(err.to_error_info().details["reason"], "private_requires_owner");
    }

    #[tokio::test]
    async fn test_blank_owner_is_anonymous() {
        let mut repo = MockLinkRepository::new();
        repo.expect_create().never();

        let service = service(repo, Arc::new(NullCache::new()));
        let err = service
            .create(&validated(URL), Some("   "), false, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_create_persists_and_populates_cache() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_destination().times(1).returning(|_| Ok(None));
        repo.expect_create()
            .times(1)
            .returning(|new_link| Ok(persisted(1, new_link)));

        let cache = Arc::new(MemoryCache::new());
        let service = service(repo, cache.clone());

        let link = service
            .create(&validated(URL), None, true, Some(10))
            .await
            .unwrap();

        assert_eq!(link.code.len(), 10);
        assert_eq!(link.destination, URL);
        assert_eq!(
            cache.get(&keys::short_code(&link.code)).await.unwrap().as_deref(),
            Some(URL)
        );
        assert_eq!(
            cache.get(&keys::destination(URL)).await.unwrap(),
            Some(link.code.clone())
        );
    }

    #[tokio::test]
    async fn test_out_of_range_length_uses_default() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_destination().returning(|_| Ok(None));
        repo.expect_create()
            .returning(|new_link| Ok(persisted(1, new_link)));

        let service = service(repo, Arc::new(NullCache::new()));
        let link = service
            .create(&validated(URL), None, true, Some(40))
            .await
            .unwrap();

        assert_eq!(link.code.len(), 8);
    }

    #[tokio::test]
    async fn test_owned_link_skips_dedup_and_destination_cache() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_destination().never();
        repo.expect_create()
            .withf(|new_link| {
                new_link.owner.as_deref() == Some("alice")
                    && new_link.visibility == Visibility::Private
            })
            .times(1)
            .returning(|new_link| Ok(persisted(2, new_link)));

        let cache = Arc::new(MemoryCache::new());
        let service = service(repo, cache.clone());

        let link = service
            .create(&validated(URL), Some("alice"), false, None)
            .await
            .unwrap();

        assert!(cache.get(&keys::short_code(&link.code)).await.unwrap().is_some());
        assert!(cache.get(&keys::destination(URL)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_collision_is_retried() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_destination().returning(|_| Ok(None));

        let mut calls = 0;
        repo.expect_create().times(3).returning(move |new_link| {
            calls += 1;
            if calls < 3 {
                Err(StoreError::UniqueViolation)
            } else {
                Ok(persisted(3, new_link))
            }
        });

        let service = service(repo, Arc::new(NullCache::new()));
        let link = service.create(&validated(URL), None, true, None).await.unwrap();

        assert_eq!(link.id, 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_destination().returning(|_| Ok(None));
        repo.expect_create()
            .times(DEFAULT_MAX_ATTEMPTS)
            .returning(|_| Err(StoreError::UniqueViolation));

        let service = service(repo, Arc::new(NullCache::new()));
        let err = service
            .create(&validated(URL), None, true, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CodeAllocationExhausted));
    }

    #[tokio::test]
    async fn test_backend_error_aborts_without_retry() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_destination().returning(|_| Ok(None));
        repo.expect_create()
            .times(1)
            .returning(|_| Err(StoreError::Backend("disk full".into())));

        let service = service(repo, Arc::new(NullCache::new()));
        let err = service
            .create(&validated(URL), None, true, None)
            .await
            .unwrap_err();

        let info = err.to_error_info();
        assert_eq!(info.code, "internal_error");
        assert_eq!(info.message, "Failed to create short link");
    }

    #[tokio::test]
    async fn test_anonymous_reuse_through_cache() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .withf(|code| code == "cached01")
            .times(1)
            .returning(|_| Ok(Some(link("cached01", URL, None))));
        repo.expect_find_by_destination().never();
        repo.expect_create().never();

        let cache = Arc::new(MemoryCache::new());
        cache
            .set(&keys::destination(URL), "cached01", Duration::from_secs(60))
            .await
            .unwrap();

        let service = service(repo, cache);
        let link = service.create(&validated(URL), None, true, None).await.unwrap();

        assert_eq!(link.code, "cached01");
    }

    #[tokio::test]
    async fn test_stale_cache_hit_falls_back_to_store() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .returning(|_| Ok(Some(link("cached01", URL, Some("mallory")))));
        repo.expect_find_by_destination()
            .times(1)
            .returning(|_| Ok(Some(link("stored01", URL, None))));
        repo.expect_create().never();

        let cache = Arc::new(MemoryCache::new());
        cache
            .set(&keys::destination(URL), "cached01", Duration::from_secs(60))
            .await
            .unwrap();

        let service = service(repo, cache.clone());
        let link = service.create(&validated(URL), None, true, None).await.unwrap();

        assert_eq!(link.code, "stored01");
        assert_eq!(
            cache.get(&keys::destination(URL)).await.unwrap().as_deref(),
            Some("stored01")
        );
    }

    #[tokio::test]
    async fn test_anonymous_reuse_without_cache() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_destination()
            .times(2)
            .returning(|_| Ok(Some(link("stored01", URL, None))));
        repo.expect_create().never();

        let service = service(repo, Arc::new(NullCache::new()));
        let first = service.create(&validated(URL), None, true, None).await.unwrap();
        let second = service.create(&validated(URL), None, true, None).await.unwrap();

        assert_eq!(first.code, second.code);
    }

    #[tokio::test]
    async fn test_cache_failures_do_not_escape() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_destination().returning(|_| Ok(None));
        repo.expect_create()
            .returning(|new_link| Ok(persisted(1, new_link)));
        repo.expect_find_by_code()
            .returning(|code| Ok(Some(link(code, URL, None))));

        let service = service(repo, Arc::new(FailingCache));
        let created = service.create(&validated(URL), None, true, None).await.unwrap();
        let resolved = service.resolve(&created.code).await.unwrap();

        assert_eq!(resolved.destination, URL);
        assert!(!service.cache_healthy().await);
    }

    #[tokio::test]
    async fn test_resolve_malformed_code_skips_store() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().never();

        let service = service(repo, Arc::new(NullCache::new()));

        for code in ["abc", "has space", "way-too-long-code"] {
            let err = service.resolve(code).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound { .. }));
        }
    }

    #[tokio::test]
    async fn test_resolve_miss_is_not_cached() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(2).returning(|_| Ok(None));

        let cache = Arc::new(MemoryCache::new());
        let service = service(repo, cache.clone());

        assert!(matches!(
            service.resolve("missing1").await.unwrap_err(),
            AppError::NotFound { .. }
        ));
        assert!(cache.is_empty());
        assert!(service.resolve("missing1").await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_reads_store_and_fills_cache() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .times(2)
            .returning(|code| Ok(Some(link(code, URL, None))));

        let cache = Arc::new(MemoryCache::new());
        let service = service(repo, cache.clone());

        let first = service.resolve("abc123XY").await.unwrap();
        assert_eq!(first.click_count, 3);
        assert_eq!(
            cache.get(&keys::short_code("abc123XY")).await.unwrap().as_deref(),
            Some(URL)
        );

        // the cache hit still goes to the store for the current link
        let second = service.resolve("abc123XY").await.unwrap();
        assert_eq!(second.destination, URL);
    }

    #[tokio::test]
    async fn test_list_by_owner() {
        let mut repo = MockLinkRepository::new();
        repo.expect_list_by_owner()
            .withf(|owner, page, size| owner == "alice" && *page == 2 && *size == 10)
            .returning(|_, _, _| Ok(vec![link("abc123XY", URL, Some("alice"))]));
        repo.expect_count_by_owner().returning(|_| Ok(11));

        let service = service(repo, Arc::new(NullCache::new()));
        let page = service.list_by_owner("alice", 2, 10).await.unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 11);
        assert_eq!(page.page, 2);
    }

    #[tokio::test]
    async fn test_increment_click_passes_through() {
        let mut repo = MockLinkRepository::new();
        repo.expect_increment_clicks()
            .withf(|code| code == "abc123XY")
            .returning(|_| Ok(true));

        let service = service(repo, Arc::new(NullCache::new()));
        assert!(service.increment_click("abc123XY").await.unwrap());
    }
}
