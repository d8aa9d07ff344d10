//! Resilient Cache
//!
//! A unified key-value cache for request-handling services featuring:
//! - **Remote Backend**: Distributed caching with Redis, bounded by short connect/command timeouts
//! - **Fallback Backend**: In-process store with lazy TTL expiration
//! - **Connection Supervisor**: Transparent, one-way demotion from Redis to the fallback store
//! - **Pipelines**: Ordered batches of writes submitted in one round trip
//! - **Rate Limiting**: Fixed-window request counting that fails open
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use resilient_cache::CacheSystem;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Reads REDIS_URL; without it the system runs on the in-process store
//!     let cache = CacheSystem::new().await?;
//!
//!     let client = cache.cache_client();
//!     client.set_with_ttl("market_data:AAPL:2024", &serde_json::json!({"close": 190.1}), 3600).await?;
//!
//!     if let Some(cached) = client.get::<serde_json::Value>("market_data:AAPL:2024").await? {
//!         tracing::info!("Cached data: {}", cached);
//!     }
//!
//!     let decision = cache.rate_limiter().check_rate_limit("10.0.0.7", 5, 60_000).await?;
//!     if !decision.allowed {
//!         tracing::warn!(retry_after = ?decision.retry_after(), "Too many requests");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! caller → CacheClient → ConnectionSupervisor ─ Active ──→ RedisCache
//!                               │                   │ BackendUnavailable
//!                               │                   ▼ (demote, retry once)
//!                               └──── Degraded ───→ MemoryCache
//! ```
//!
//! Operation errors are [`CacheError`]s. Transport failures never reach the
//! caller: the supervisor absorbs them by switching to the fallback store.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

pub mod backends;
pub mod builder;
pub mod client;
pub mod codecs;
pub mod config;
pub mod error;
pub mod pattern;
pub mod rate_limit;
pub mod supervisor;
pub mod traits;

pub use backends::{MemoryCache, RedisCache};
pub use builder::CacheSystemBuilder;
pub use client::{CacheClient, Pipeline};
pub use codecs::JsonCodec;
#[cfg(feature = "msgpack")]
pub use codecs::MsgPackCodec;
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use supervisor::{BackendState, ConnectionSupervisor, SupervisorHealth};
pub use traits::{CacheBackend, CacheCodec, PipelineOp};

// Re-export async_trait for user convenience
pub use async_trait::async_trait;

/// Main entry point for the Resilient Cache system
///
/// Constructed once at process start and handed to every collaborator by
/// clone; all clones share one supervisor and one fallback store.
///
/// # Example
///
/// ```rust,no_run
/// use resilient_cache::{CacheConfig, CacheSystem};
///
/// #[tokio::main]
/// async fn main() {
///     let config = CacheConfig::default().with_remote("redis://localhost:6379");
///     let cache = CacheSystem::with_config(config).await;
///
///     let client = cache.cache_client();
///     let limiter = cache.rate_limiter();
/// }
/// ```
#[derive(Clone)]
pub struct CacheSystem {
    /// Backend selection shared by the client and limiter
    pub supervisor: Arc<ConnectionSupervisor>,
    /// Unified cache client (primary interface)
    pub client: CacheClient,
    /// Rate limiter built on `client`
    pub rate_limiter: Arc<RateLimiter>,
}

impl CacheSystem {
    /// Create new cache system configured from the environment
    ///
    /// # Configuration
    ///
    /// The Redis endpoint comes from `REDIS_URL`. When it is unset the system
    /// starts degraded, on the in-process store. See [`CacheConfig::from_env`]
    /// for the timeout variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is set but malformed. An
    /// unreachable Redis is not an error.
    pub async fn new() -> Result<Self> {
        info!("Initializing Resilient Cache System");
        Ok(CacheSystemBuilder::from_env()?.build().await)
    }

    /// Create cache system from explicit configuration
    pub async fn with_config(config: CacheConfig) -> Self {
        CacheSystemBuilder::new().with_config(config).build().await
    }

    /// Create cache system with custom Redis URL and default timeouts
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection string (e.g., "redis://localhost:6379")
    pub async fn with_redis_url(redis_url: &str) -> Self {
        info!(redis_url = %redis_url, "Initializing Resilient Cache System with custom Redis URL");
        Self::with_config(CacheConfig::default().with_remote(redis_url)).await
    }

    /// Perform health check on the active backend
    ///
    /// Returns `true` when the backend currently serving calls is operational.
    /// A remote that fails the check is demoted and `false` is returned once;
    /// from then on the in-process store is checked. Running degraded is not
    /// unhealthy in itself; it is logged and reported through
    /// [`health`](Self::health).
    pub async fn health_check(&self) -> bool {
        let backend = self.supervisor.active_backend_name();
        let healthy = self.supervisor.health_check().await;
        let health = self.supervisor.health();

        if !healthy {
            warn!(backend = backend, "Resilient Cache health check failed");
        } else if health.is_degraded() {
            warn!(
                remote_configured = health.remote_configured,
                demotions = health.demotions,
                last_failure = ?health.last_failure,
                "Resilient Cache running degraded on the in-process store"
            );
        } else {
            info!(backend = backend, "Resilient Cache health check passed");
        }
        healthy
    }

    /// Degraded-mode status for reporting
    #[must_use]
    pub fn health(&self) -> SupervisorHealth {
        self.supervisor.health()
    }

    /// Get reference to the cache client (primary interface)
    #[must_use]
    pub fn cache_client(&self) -> &CacheClient {
        &self.client
    }

    /// Get reference to the rate limiter
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }
}
