//! Fixed-window request governor with tiered limits and a burst allowance.
//!
//! Counters live in the shared [`CacheService`], so every instance pointed at the same
//! Redis enforces the same limits. The cache's single `incr` is the only synchronization;
//! the limiter itself keeps no per-caller state.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::entities::{Caller, Tier};
use crate::infrastructure::cache::{CacheError, CacheResult, CacheService, keys};

/// Limits and window settings.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub default_limit: u64,
    pub anonymous_limit: u64,
    pub authenticated_limit: u64,
    pub premium_limit: u64,
    pub window: Duration,
    pub burst_enabled: bool,
    pub burst_multiplier: f64,
    pub burst_window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            default_limit: 100,
            anonymous_limit: 50,
            authenticated_limit: 100,
            premium_limit: 500,
            window: Duration::from_secs(60),
            burst_enabled: true,
            burst_multiplier: 1.5,
            burst_window: Duration::from_secs(10),
        }
    }
}

impl RateLimitPolicy {
    pub fn limit_for(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Anonymous => self.anonymous_limit,
            Tier::Authenticated => self.authenticated_limit,
            Tier::Premium => self.premium_limit,
            Tier::Unknown => self.default_limit,
        }
    }

    fn burst_limit(&self, base: u64) -> u64 {
        (base as f64 * self.burst_multiplier).floor() as u64
    }
}

/// Who is being limited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitIdentity {
    pub user_id: Option<String>,
    pub ip: String,
    pub tier: Tier,
}

impl RateLimitIdentity {
    pub fn anonymous(ip: impl Into<String>) -> Self {
        Self {
            user_id: None,
            ip: ip.into(),
            tier: Tier::Anonymous,
        }
    }

    /// Authenticated callers are keyed by owner id, everyone else by IP.
    pub fn from_caller(caller: Option<&Caller>, ip: impl Into<String>) -> Self {
        match caller {
            Some(caller) => Self {
                user_id: Some(caller.owner_id.clone()),
                ip: ip.into(),
                tier: caller.tier,
            },
            None => Self::anonymous(ip),
        }
    }

    pub fn key(&self) -> String {
        match self.user_id.as_deref().filter(|id| !id.is_empty()) {
            Some(user_id) => keys::rate_limit_user(user_id),
            None => keys::rate_limit_ip(&self.ip),
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    pub count: u64,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
    pub reset_in: Duration,
    pub exceeded: bool,
}

impl RateLimitDecision {
    fn new(count: u64, limit: u64, reset_in: Duration) -> Self {
        Self {
            count,
            limit,
            remaining: limit.saturating_sub(count),
            reset_at: reset_at(reset_in),
            reset_in,
            exceeded: count > limit,
        }
    }

    /// Used for whitelisted callers and when the cache is unavailable.
    fn unlimited(limit: u64, window: Duration) -> Self {
        Self::new(0, limit, window)
    }

    /// Whole seconds until the window resets, at least one.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_in.as_secs() + u64::from(self.reset_in.subsec_nanos() > 0);
        secs.max(1)
    }
}

fn reset_at(reset_in: Duration) -> DateTime<Utc> {
    let delta = chrono::Duration::from_std(reset_in).unwrap_or(chrono::Duration::zero());
    Utc::now() + delta
}

/// Cache-backed fixed-window rate limiter.
pub struct RateLimiter {
    cache: Arc<dyn CacheService>,
    policy: RateLimitPolicy,
    whitelist: RwLock<HashSet<String>>,
}

impl RateLimiter {
    pub fn new(
        cache: Arc<dyn CacheService>,
        policy: RateLimitPolicy,
        whitelist: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            cache,
            policy,
            whitelist: RwLock::new(whitelist.into_iter().collect()),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn add_to_whitelist(&self, ip: &str) {
        self.whitelist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ip.to_string());
    }

    pub fn remove_from_whitelist(&self, ip: &str) {
        self.whitelist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(ip);
    }

    pub fn is_whitelisted(&self, ip: &str) -> bool {
        self.whitelist
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(ip)
    }

    /// Counts one request against the caller's tiered limit.
    ///
    /// Never fails: cache errors are logged and the request is allowed.
    pub async fn check(&self, identity: &RateLimitIdentity) -> RateLimitDecision {
        let base = self.policy.limit_for(identity.tier);

        if self.is_whitelisted(&identity.ip) {
            return RateLimitDecision::unlimited(base, self.policy.window);
        }

        let key = identity.key();
        match self.check_tiered(&key, base).await {
            Ok(decision) => self.finish(&key, decision),
            Err(e) => self.fail_open(&key, &e, base, self.policy.window),
        }
    }

    /// Counts one request against a per-path limit, without tiers or burst.
    pub async fn check_custom(
        &self,
        identity: &RateLimitIdentity,
        path: &str,
        limit: u64,
        window: Duration,
    ) -> RateLimitDecision {
        if self.is_whitelisted(&identity.ip) {
            return RateLimitDecision::unlimited(limit, window);
        }

        let key = keys::custom_limit(&identity.key(), path);
        match self.hit(&key, window).await {
            Ok((count, reset_in)) => {
                self.finish(&key, RateLimitDecision::new(count, limit, reset_in))
            }
            Err(e) => self.fail_open(&key, &e, limit, window),
        }
    }

    async fn check_tiered(&self, key: &str, base: u64) -> CacheResult<RateLimitDecision> {
        let burst_key = keys::burst(key);

        let burst_active =
            self.policy.burst_enabled && self.cache.get(&burst_key).await?.is_some();
        let limit = if burst_active {
            self.policy.burst_limit(base)
        } else {
            base
        };

        let (count, reset_in) = self.hit(key, self.policy.window).await?;
        let decision = RateLimitDecision::new(count, limit, reset_in);

        if decision.exceeded && self.policy.burst_enabled && !burst_active {
            self.cache
                .set(&burst_key, "1", self.policy.burst_window)
                .await?;
            debug!(key, "Burst allowance activated");
        }

        Ok(decision)
    }

    /// Increments the window counter and makes sure it expires.
    async fn hit(&self, key: &str, window: Duration) -> CacheResult<(u64, Duration)> {
        let count = self.cache.incr(key).await?;
        let count = u64::try_from(count).unwrap_or(0);

        let ttl = if count == 1 {
            None
        } else {
            self.cache.ttl(key).await?
        };

        let reset_in = match ttl {
            Some(ttl) => ttl,
            None => {
                self.cache.expire(key, window).await?;
                window
            }
        };

        Ok((count, reset_in))
    }

    fn finish(&self, key: &str, decision: RateLimitDecision) -> RateLimitDecision {
        if decision.exceeded {
            metrics::counter!("rate_limit_exceeded_total").increment(1);
            debug!(key, count = decision.count, limit = decision.limit, "Rate limit exceeded");
        }
        decision
    }

    fn fail_open(
        &self,
        key: &str,
        error: &CacheError,
        limit: u64,
        window: Duration,
    ) -> RateLimitDecision {
        warn!(key, error = %error, "Rate limit check failed, allowing request");
        metrics::counter!("cache_errors_total").increment(1);
        RateLimitDecision::unlimited(limit, window)
    }
}
