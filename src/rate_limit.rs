//! Fixed-Window Rate Limiter
//!
//! Counts requests per identifier with nothing but the client's `incr`,
//! `expire` and `ttl`. Each identifier gets one counter key,
//! `rateLimit:<identifier>`, whose TTL is the remaining window.
//!
//! ```text
//! count = incr(key)
//! if count == 1: expire(key, window)     // only the first hit starts the window
//! allowed   = count <= limit
//! remaining = max(0, limit - count)
//! reset_at  = now + ttl(key)
//! ```
//!
//! `incr` and `expire` are two separate calls. If the process stalls between
//! them for longer than the counter's default TTL (60 s), the counter can
//! expire before the window is applied and the next request starts a fresh
//! window. This is an accepted approximation.
//!
//! The limiter fails open: if the counter cannot be updated, the request is
//! allowed and the decision is marked with `fail_open`.

use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::client::CacheClient;
use crate::codecs::JsonCodec;
use crate::error::{CacheError, CacheResult};
use crate::traits::CacheCodec;

/// Prefix of every counter key
pub const RATE_LIMIT_KEY_PREFIX: &str = "rateLimit:";

/// Limit and window for one rate-limit policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub limit: u64,
    /// Window length
    pub window: Duration,
}

impl RateLimitConfig {
    /// Create a policy of `limit` requests per `window_ms` milliseconds
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`] if `window_ms` is 0.
    pub fn new(limit: u64, window_ms: u64) -> CacheResult<Self> {
        if window_ms == 0 {
            return Err(CacheError::InvalidArgument(
                "rate limit window must be at least 1 ms".to_string(),
            ));
        }
        Ok(Self {
            limit,
            window: Duration::from_millis(window_ms),
        })
    }

    /// The window as a TTL: whole seconds, rounded up, never below one.
    #[must_use]
    pub fn window_secs(&self) -> u64 {
        let millis = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);
        millis.div_ceil(1000).max(1)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// Outcome of one rate-limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured limit
    pub limit: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// Requests counted in the current window, this one included
    pub count: u64,
    /// When the current window ends
    pub reset_at: SystemTime,
    /// The counter could not be updated and the request was let through
    pub fail_open: bool,
}

impl RateLimitDecision {
    fn fail_open(config: RateLimitConfig) -> Self {
        Self {
            allowed: true,
            limit: config.limit,
            remaining: config.limit,
            count: 0,
            reset_at: SystemTime::now() + config.window,
            fail_open: true,
        }
    }

    /// How long a rejected caller should wait, `None` when allowed.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        if self.allowed {
            return None;
        }
        Some(
            self.reset_at
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        )
    }
}

/// Fixed-window rate limiter over a [`CacheClient`]
pub struct RateLimiter<C: CacheCodec = JsonCodec> {
    client: CacheClient<C>,
    config: RateLimitConfig,
    key_prefix: String,
}

impl<C: CacheCodec> RateLimiter<C> {
    /// Create a limiter enforcing `config` by default
    #[must_use]
    pub fn new(client: CacheClient<C>, config: RateLimitConfig) -> Self {
        Self {
            client,
            config,
            key_prefix: RATE_LIMIT_KEY_PREFIX.to_string(),
        }
    }

    /// Use a different counter key prefix
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// The default policy
    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Counter key for `identifier`
    #[must_use]
    pub fn key_for(&self, identifier: &str) -> String {
        format!("{}{identifier}", self.key_prefix)
    }

    /// Count a request from `identifier` against the default policy
    pub async fn check(&self, identifier: &str) -> RateLimitDecision {
        self.evaluate(identifier, self.config).await
    }

    /// Count a request from `identifier` against an explicit policy
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`] if `window_ms` is 0. Cache
    /// failures never surface here; the limiter fails open instead.
    pub async fn check_rate_limit(&self, identifier: &str, limit: u64, window_ms: u64) -> CacheResult<RateLimitDecision> {
        let config = RateLimitConfig::new(limit, window_ms)?;
        Ok(self.evaluate(identifier, config).await)
    }

    /// Forget the current window for `identifier`
    ///
    /// # Errors
    ///
    /// Returns an error if the active backend rejects the delete.
    pub async fn reset(&self, identifier: &str) -> CacheResult<bool> {
        let key = self.key_for(identifier);
        Ok(self.client.del(&[key.as_str()]).await? > 0)
    }

    async fn evaluate(&self, identifier: &str, config: RateLimitConfig) -> RateLimitDecision {
        let key = self.key_for(identifier);

        let count = match self.client.incr(&key).await {
            Ok(count) => u64::try_from(count).unwrap_or(0),
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "Rate limit counter unavailable, failing open");
                return RateLimitDecision::fail_open(config);
            }
        };

        if count == 1 {
            if let Err(e) = self.client.expire(&key, config.window_secs()).await {
                warn!(identifier = %identifier, error = %e, "Failed to start rate limit window");
            }
        }

        let ttl_secs = match self.client.ttl(&key).await {
            Ok(ttl) if ttl >= 0 => ttl.unsigned_abs(),
            Ok(_) => config.window_secs(),
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "Failed to read rate limit window");
                config.window_secs()
            }
        };

        let decision = RateLimitDecision {
            allowed: count <= config.limit,
            limit: config.limit,
            remaining: config.limit.saturating_sub(count),
            count,
            reset_at: SystemTime::now() + Duration::from_secs(ttl_secs),
            fail_open: false,
        };

        debug!(
            identifier = %identifier,
            count = count,
            limit = config.limit,
            allowed = decision.allowed,
            "Rate limit checked"
        );
        decision
    }
}
