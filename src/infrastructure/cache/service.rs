//! Cache service trait and error types.

use std::time::Duration;

use async_trait::async_trait;

/// Errors that can occur during cache operations.
///
/// Callers treat every variant as a miss; none of them reach HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache operation error: {0}")]
    Operation(String),

    #[error("Cache operation timed out")]
    Timeout,

    #[error("Cache is disabled")]
    Disabled,
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Volatile key/value store with TTLs and an atomic counter primitive.
///
/// The link service uses `get`/`set` for cache-aside reads; the rate limiter uses
/// `incr`/`expire`/`ttl` for its fixed windows. The system stays correct with no cache at
/// all, only slower.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed, shared between instances
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process map with TTLs
/// - [`crate::infrastructure::cache::NullCache`] - No-op implementation for disabled caching
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Returns `Ok(None)` on a miss or an expired entry.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Atomically increments the integer at `key`, creating it at `1`.
    ///
    /// An existing TTL is preserved.
    async fn incr(&self, key: &str) -> CacheResult<i64>;

    /// Sets the TTL of an existing key. Missing keys are ignored.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()>;

    /// Remaining TTL, or `None` if the key is missing or never expires.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Used by the health endpoint to report cache status.
    async fn health_check(&self) -> bool;

    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;
}
