//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, cache setup, worker spawning, and Axum server lifecycle.

use crate::application::services::{
    AuthService, DynAuthService, DynLinkService, LinkService, RateLimiter,
};
use crate::config::Config;
use crate::domain::click_event::ClickSender;
use crate::domain::click_worker::run_click_worker;
use crate::domain::repositories::{LinkRepository, TokenRepository};
use crate::infrastructure::cache::{CacheService, MemoryCache, NullCache, RedisCache};
use crate::infrastructure::persistence::{PgLinkRepository, PgTokenRepository};
use crate::routes::app_router;
use crate::state::{AppState, LookupLimit, normalize_base_url};
use crate::utils::code_generator::ShortcodeGenerator;
use crate::utils::url_validator::UrlValidator;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// How often the in-process rate limit cache drops expired windows.
const MEMORY_CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Redis cache (or NullCache for links and an in-process counter store for rate limits)
/// - Background click worker
/// - Axum HTTP server with graceful shutdown
///
/// On shutdown the router (and with it every click sender) is dropped, and the click
/// worker finishes the queued increments before this function returns.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - The short code salt or URL policy is invalid
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let (link_cache, rate_cache) = build_caches(&config).await;

    let pool = Arc::new(pool);
    let link_repository: Arc<dyn LinkRepository> = Arc::new(PgLinkRepository::new(pool.clone()));
    let token_repository: Arc<dyn TokenRepository> = Arc::new(PgTokenRepository::new(pool));

    let generator = ShortcodeGenerator::new(config.shortcode_salt.as_bytes())
        .context("Invalid SHORTCODE_SALT")?;

    let link_service: Arc<DynLinkService> = Arc::new(LinkService::new(
        link_repository,
        link_cache,
        Arc::new(generator),
        config.link_cache_ttl(),
    ));
    let auth_service: Arc<DynAuthService> = Arc::new(AuthService::new(
        token_repository,
        config.token_signing_secret.clone(),
    ));

    let rate_limiter = Arc::new(RateLimiter::new(
        rate_cache,
        config.rate_limit.clone(),
        config.rate_limit_whitelist.iter().cloned(),
    ));
    let url_validator = Arc::new(
        UrlValidator::new(config.url_policy.clone()).context("Invalid URL_BLOCKED_PATTERNS")?,
    );

    let (click_sender, click_rx) = ClickSender::channel(config.click_queue_capacity);
    let click_worker = tokio::spawn(run_click_worker(
        click_rx,
        link_service.clone(),
        config.click_worker_concurrency,
    ));

    let state = AppState {
        link_service,
        auth_service,
        rate_limiter,
        url_validator,
        click_sender,
        base_url: normalize_base_url(&config.base_url),
        behind_proxy: config.behind_proxy,
        lookup_limit: LookupLimit {
            limit: config.lookup_limit,
            window: Duration::from_secs(config.lookup_window_seconds),
        },
    };

    let app = app_router(state, &config.router_options());

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid LISTEN address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped, draining click queue");
    if let Err(e) = click_worker.await {
        tracing::error!(error = %e, "Click worker panicked");
    }

    Ok(())
}

/// Picks the link cache and the rate limit counter store.
///
/// With Redis both share it. Without Redis, links are served straight from the store and
/// rate limits are counted in process.
async fn build_caches(config: &Config) -> (Arc<dyn CacheService>, Arc<dyn CacheService>) {
    if let Some(redis_url) = &config.redis_url {
        let op_timeout = Duration::from_millis(config.cache_op_timeout_ms);
        match RedisCache::connect(redis_url, op_timeout).await {
            Ok(redis) => {
                tracing::info!("Cache enabled (Redis)");
                let redis: Arc<dyn CacheService> = Arc::new(redis);
                return (redis.clone(), redis);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to connect to Redis: {}. Falling back to local caches.",
                    e
                );
            }
        }
    } else {
        tracing::info!("Cache disabled (NullCache), rate limits counted in process");
    }

    let memory = Arc::new(MemoryCache::new());
    spawn_memory_sweeper(memory.clone());

    (Arc::new(NullCache::new()), memory)
}

fn spawn_memory_sweeper(cache: Arc<MemoryCache>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MEMORY_CACHE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired rate limit windows");
            }
        }
    });
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
