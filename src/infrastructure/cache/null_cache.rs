//! No-op cache implementation for disabled caching.

use std::time::Duration;

use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use tracing::debug;

/// A cache that stores nothing.
///
/// Reads always miss and writes succeed without effect. `incr` fails with
/// [`CacheError::Disabled`] because a counter that never counts would silently disable
/// rate limiting; the server wires a [`super::MemoryCache`] for the limiter instead.
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        debug!("Using NullCache (caching disabled)");
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheService for NullCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn incr(&self, _key: &str) -> CacheResult<i64> {
        Err(CacheError::Disabled)
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn ttl(&self, _key: &str) -> CacheResult<Option<Duration>> {
        Ok(None)
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "disabled"
    }
}
