#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use snaplink::application::services::auth_service::hash_token;
use snaplink::application::services::{
    AuthService, DynAuthService, DynLinkService, LinkCacheTtl, LinkService, RateLimitPolicy,
    RateLimiter,
};
use snaplink::domain::click_event::{ClickEvent, ClickSender};
use snaplink::domain::entities::{Link, NewLink, Tier};
use snaplink::domain::repositories::{
    ApiToken, LinkRepository, NewApiToken, StoreError, StoreResult, TokenRepository,
};
use snaplink::infrastructure::cache::{CacheService, MemoryCache, NullCache};
use snaplink::routes::{RouterOptions, router};
use snaplink::state::{AppState, LookupLimit, normalize_base_url};
use snaplink::utils::code_generator::ShortcodeGenerator;
use snaplink::utils::url_validator::{UrlPolicy, UrlValidator};

pub const SALT: &str = "integration-test-salt-0123456789abcdef";
pub const SIGNING_SECRET: &str = "integration-test-signing-secret";
pub const BASE_URL: &str = "https://sho.rt";

/// In-memory link store with a unique code constraint.
///
/// `colliding_prefixes` makes every code starting with one of the given characters fail
/// with a unique violation, to exercise the retry loop under contention.
#[derive(Default)]
pub struct InMemoryLinkRepository {
    links: Mutex<Vec<Link>>,
    next_id: AtomicI64,
    inserts: AtomicUsize,
    colliding_prefixes: Vec<char>,
    forced_collisions: AtomicUsize,
    pub unavailable: AtomicBool,
}

impl InMemoryLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn colliding_on(prefixes: &str) -> Self {
        Self {
            colliding_prefixes: prefixes.chars().collect(),
            ..Self::default()
        }
    }

    /// The next `n` inserts fail with a unique violation.
    pub fn force_collisions(&self, n: usize) {
        self.forced_collisions.store(n, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<Link> {
        self.links.lock().unwrap().clone()
    }

    pub fn get(&self, code: &str) -> Option<Link> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.code == code)
            .cloned()
    }

    pub fn insert_attempts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkRepository for InMemoryLinkRepository {
    async fn create(&self, new_link: NewLink) -> StoreResult<Link> {
        self.check_available()?;

        self.inserts.fetch_add(1, Ordering::SeqCst);

        if self
            .forced_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::UniqueViolation);
        }

        if new_link
            .code
            .chars()
            .next()
            .is_some_and(|c| self.colliding_prefixes.contains(&c))
        {
            return Err(StoreError::UniqueViolation);
        }

        let mut links = self.links.lock().unwrap();
        if links.iter().any(|l| l.code == new_link.code) {
            return Err(StoreError::UniqueViolation);
        }

        let link = Link {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            code: new_link.code,
            destination: new_link.destination,
            owner: new_link.owner,
            visibility: new_link.visibility,
            click_count: 0,
            created_at: Utc::now(),
        };
        links.push(link.clone());
        Ok(link)
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Link>> {
        self.check_available()?;
        Ok(self.get(code))
    }

    async fn find_by_destination(&self, destination: &str) -> StoreResult<Option<Link>> {
        self.check_available()?;
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.owner.is_none() && l.destination == destination)
            .min_by_key(|l| l.id)
            .cloned())
    }

    async fn list_by_owner(&self, owner: &str, page: i64, page_size: i64) -> StoreResult<Vec<Link>> {
        self.check_available()?;
        let mut owned: Vec<Link> = self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.owner.as_deref() == Some(owner))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.id.cmp(&a.id));

        let offset = ((page.max(1) - 1) * page_size) as usize;
        Ok(owned
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect())
    }

    async fn count_by_owner(&self, owner: &str) -> StoreResult<i64> {
        self.check_available()?;
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.owner.as_deref() == Some(owner))
            .count() as i64)
    }

    async fn increment_clicks(&self, code: &str) -> StoreResult<bool> {
        self.check_available()?;
        let mut links = self.links.lock().unwrap();
        match links.iter_mut().find(|l| l.code == code) {
            Some(link) => {
                link.click_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}

/// In-memory token store keyed by hash.
#[derive(Default)]
pub struct InMemoryTokenRepository {
    tokens: Mutex<Vec<ApiToken>>,
}

impl InMemoryTokenRepository {
    /// Registers `raw` for `owner` and returns it for use in `Authorization` headers.
    pub fn issue(&self, raw: &str, owner: &str, tier: Tier) -> String {
        let mut tokens = self.tokens.lock().unwrap();
        let id = tokens.len() as i64 + 1;
        tokens.push(ApiToken {
            id,
            name: format!("{owner}-{id}"),
            owner_id: owner.to_string(),
            tier,
            token_hash: hash_token(SIGNING_SECRET, raw),
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
        });
        raw.to_string()
    }

    pub fn revoke_all(&self) {
        for token in self.tokens.lock().unwrap().iter_mut() {
            token.revoked_at = Some(Utc::now());
        }
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn find_active(&self, token_hash: &str) -> StoreResult<Option<ApiToken>> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.token_hash == token_hash && !t.is_revoked())
            .cloned())
    }

    async fn update_last_used(&self, token_hash: &str) -> StoreResult<()> {
        if let Some(token) = self
            .tokens
            .lock()
            .unwrap()
            .iter_mut()
            .find(|t| t.token_hash == token_hash)
        {
            token.last_used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn create_token(&self, new_token: NewApiToken) -> StoreResult<ApiToken> {
        let mut tokens = self.tokens.lock().unwrap();
        let token = ApiToken {
            id: tokens.len() as i64 + 1,
            name: new_token.name,
            owner_id: new_token.owner_id,
            tier: new_token.tier,
            token_hash: new_token.token_hash,
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
        };
        tokens.push(token.clone());
        Ok(token)
    }

    async fn list_tokens(&self) -> StoreResult<Vec<ApiToken>> {
        Ok(self.tokens.lock().unwrap().clone())
    }

    async fn revoke_token(&self, id: i64) -> StoreResult<bool> {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens.iter_mut().find(|t| t.id == id && !t.is_revoked()) {
            Some(token) => {
                token.revoked_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Knobs for [`TestApp::build`].
pub struct TestOptions {
    pub link_cache: Arc<dyn CacheService>,
    pub rate_limit: RateLimitPolicy,
    pub whitelist: Vec<String>,
    pub lookup_limit: u64,
    pub url_policy: UrlPolicy,
    pub links: Arc<InMemoryLinkRepository>,
    pub router: RouterOptions,
    /// Integration tests reach the server through a simulated proxy by default.
    pub behind_proxy: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            link_cache: Arc::new(MemoryCache::new()),
            rate_limit: RateLimitPolicy::default(),
            whitelist: Vec::new(),
            lookup_limit: 30,
            url_policy: UrlPolicy::default(),
            links: Arc::new(InMemoryLinkRepository::new()),
            router: RouterOptions {
                request_timeout: Duration::from_secs(5),
                ..RouterOptions::default()
            },
            behind_proxy: true,
        }
    }
}

/// A router over in-memory stores, with handles to inspect them.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub links: Arc<InMemoryLinkRepository>,
    pub tokens: Arc<InMemoryTokenRepository>,
    pub clicks: mpsc::Receiver<ClickEvent>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(TestOptions::default())
    }

    pub fn without_cache() -> Self {
        Self::build(TestOptions {
            link_cache: Arc::new(NullCache::new()),
            ..TestOptions::default()
        })
    }

    pub fn build(options: TestOptions) -> Self {
        let tokens = Arc::new(InMemoryTokenRepository::default());
        let state = build_state(&options, tokens.clone());
        let (click_sender, clicks) = ClickSender::channel(1000);

        let state = AppState {
            click_sender,
            ..state
        };

        let server = TestServer::new(router(state.clone(), &options.router)).unwrap();

        Self {
            server,
            state,
            links: options.links,
            tokens,
            clicks,
        }
    }

    pub fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }
}

/// State over the given stores; the click sender is a placeholder with a dropped receiver.
pub fn build_state(options: &TestOptions, tokens: Arc<InMemoryTokenRepository>) -> AppState {
    let link_repository: Arc<dyn LinkRepository> = options.links.clone();
    let token_repository: Arc<dyn TokenRepository> = tokens;

    let link_service: Arc<DynLinkService> = Arc::new(LinkService::new(
        link_repository,
        options.link_cache.clone(),
        Arc::new(ShortcodeGenerator::new(SALT).unwrap()),
        LinkCacheTtl::default(),
    ));
    let auth_service: Arc<DynAuthService> = Arc::new(AuthService::new(
        token_repository,
        SIGNING_SECRET.to_string(),
    ));

    let (click_sender, _rx) = ClickSender::channel(1);

    AppState {
        link_service,
        auth_service,
        rate_limiter: Arc::new(RateLimiter::new(
            Arc::new(MemoryCache::new()),
            options.rate_limit.clone(),
            options.whitelist.clone(),
        )),
        url_validator: Arc::new(UrlValidator::new(options.url_policy.clone()).unwrap()),
        click_sender,
        base_url: normalize_base_url(BASE_URL),
        behind_proxy: options.behind_proxy,
        lookup_limit: LookupLimit {
            limit: options.lookup_limit,
            window: Duration::from_secs(60),
        },
    }
}
