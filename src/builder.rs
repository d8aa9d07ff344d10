//! Cache System Builder
//!
//! Provides a builder for constructing [`CacheSystem`] with injected
//! configuration and, optionally, custom backends.
//!
//! # Example: Configuration From the Environment
//!
//! ```rust,no_run
//! use resilient_cache::CacheSystemBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheSystemBuilder::from_env()?.build().await;
//!     Ok(())
//! }
//! ```
//!
//! # Example: Custom Remote Backend
//!
//! ```rust,ignore
//! use resilient_cache::CacheSystemBuilder;
//! use std::sync::Arc;
//!
//! let custom_remote = Arc::new(MyMemcachedBackend::new());
//!
//! let cache = CacheSystemBuilder::new()
//!     .with_remote(custom_remote)
//!     .build()
//!     .await;
//! ```

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::backends::MemoryCache;
use crate::client::CacheClient;
use crate::config::CacheConfig;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::supervisor::ConnectionSupervisor;
use crate::traits::CacheBackend;
use crate::CacheSystem;

/// Builder for constructing [`CacheSystem`]
///
/// # Default Behavior
///
/// With no remote configured, the system runs on the in-process store from
/// the start. With `remote_endpoint` set, the builder connects to Redis and
/// falls back to the in-process store if that fails.
///
/// A backend injected with [`with_remote`](Self::with_remote) takes precedence
/// over `remote_endpoint`.
pub struct CacheSystemBuilder {
    config: CacheConfig,
    remote_backend: Option<Arc<dyn CacheBackend>>,
    fallback_backend: Option<Arc<MemoryCache>>,
    rate_limit: RateLimitConfig,
}

impl CacheSystemBuilder {
    /// Create a builder with default configuration (no remote)
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            remote_backend: None,
            fallback_backend: None,
            rate_limit: RateLimitConfig::default(),
        }
    }

    /// Create a builder configured from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new().with_config(CacheConfig::from_env()?))
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom remote backend instead of connecting to Redis
    #[must_use]
    pub fn with_remote(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.remote_backend = Some(backend);
        self
    }

    /// Share an existing in-process store as the fallback
    #[must_use]
    pub fn with_fallback(mut self, backend: Arc<MemoryCache>) -> Self {
        self.fallback_backend = Some(backend);
        self
    }

    /// Default policy for [`RateLimiter::check`]
    #[must_use]
    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Build the cache system
    ///
    /// Never fails: an unreachable remote only means the system starts in
    /// degraded mode, which [`CacheSystem::health`] reports.
    pub async fn build(self) -> CacheSystem {
        info!("Building Resilient Cache System");

        let fallback = self
            .fallback_backend
            .unwrap_or_else(|| Arc::new(MemoryCache::new()));

        let supervisor = match self.remote_backend {
            Some(remote) => {
                info!(backend = remote.name(), "Using custom remote backend");
                ConnectionSupervisor::with_backends(Some(remote), fallback, self.config).await
            }
            None => ConnectionSupervisor::connect(self.config, fallback).await,
        };

        let supervisor = Arc::new(supervisor);
        let client = CacheClient::new(Arc::clone(&supervisor));
        let rate_limiter = Arc::new(RateLimiter::new(client.clone(), self.rate_limit));

        info!(
            backend = supervisor.active_backend_name(),
            degraded = supervisor.is_degraded(),
            "Resilient Cache System built successfully"
        );

        CacheSystem {
            supervisor,
            client,
            rate_limiter,
        }
    }
}

impl Default for CacheSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}
