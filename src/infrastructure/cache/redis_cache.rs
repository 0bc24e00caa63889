//! Redis-backed cache implementation.

use std::future::Future;
use std::time::Duration;

use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisResult, aio::ConnectionManager};
use tracing::{debug, info};

/// Redis cache shared by every instance of the service.
///
/// Uses `ConnectionManager` for connection reuse and reconnects. Every command runs under
/// `op_timeout`; a slow Redis turns into [`CacheError::Timeout`] instead of a slow request.
pub struct RedisCache {
    client: ConnectionManager,
    op_timeout: Duration,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connection`] if the URL is invalid, the connection cannot
    /// be established, or the PING fails.
    pub async fn connect(redis_url: &str, op_timeout: Duration) -> CacheResult<Self> {
        info!("Connecting to Redis");

        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Connection(format!("Failed to create Redis client: {e}")))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(format!("Failed to connect to Redis: {e}")))?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::Connection(format!("Redis PING failed: {e}")))?;

        info!("✓ Connected to Redis");

        Ok(Self {
            client: manager,
            op_timeout,
        })
    }

    async fn run<T>(
        &self,
        op: &'static str,
        key: &str,
        fut: impl Future<Output = RedisResult<T>>,
    ) -> CacheResult<T> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::Operation(format!("{op} {key}: {e}"))),
            Err(_) => Err(CacheError::Timeout),
        }
    }
}

/// Redis TTL replies: `-2` missing key, `-1` no expiry.
fn ttl_from_millis(pttl: i64) -> Option<Duration> {
    u64::try_from(pttl).ok().map(Duration::from_millis)
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.client.clone();
        let value: Option<String> = self.run("GET", key, conn.get(key)).await?;

        match &value {
            Some(_) => debug!(key, "Cache HIT"),
            None => debug!(key, "Cache MISS"),
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.client.clone();
        let seconds = ttl.as_secs().max(1);

        self.run("SET", key, conn.set_ex::<_, _, ()>(key, value, seconds))
            .await?;
        debug!(key, ttl_secs = seconds, "Cache SET");
        Ok(())
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.client.clone();
        self.run("INCR", key, conn.incr(key, 1i64)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.client.clone();
        let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1);

        let _: bool = self.run("PEXPIRE", key, conn.pexpire(key, millis)).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let mut conn = self.client.clone();
        let pttl: i64 = self.run("PTTL", key, conn.pttl(key)).await?;
        Ok(ttl_from_millis(pttl))
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        matches!(
            tokio::time::timeout(self.op_timeout, conn.ping::<()>()).await,
            Ok(Ok(()))
        )
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
