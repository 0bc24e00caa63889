//! Caching layer for fast lookups and rate-limit counters.
//!
//! Provides a [`CacheService`] trait with three implementations:
//! - [`RedisCache`] - Production Redis-backed cache
//! - [`MemoryCache`] - In-process fallback, used by the rate limiter without Redis
//! - [`NullCache`] - No-op implementation for disabled caching

pub mod keys;
mod memory_cache;
mod null_cache;
mod redis_cache;
mod service;

pub use memory_cache::{Clock, ManualClock, MemoryCache, SystemClock};
pub use null_cache::NullCache;
pub use redis_cache::RedisCache;
pub use service::{CacheError, CacheResult, CacheService};
