//! Cache Backend Implementations
//!
//! Both variants of the [`CacheBackend`](crate::traits::CacheBackend) capability
//! interface live here.
//!
//! # Available Backends
//!
//! ## Remote
//! - **Redis** - Distributed cache reached over the network; the active
//!   backend while the supervisor is healthy
//!
//! ## In-Process
//! - **Memory** - `HashMap` behind a single lock with lazy expiration; the
//!   fallback store after demotion, or when no remote is configured
//!
//! # Usage
//!
//! ```rust,no_run
//! use resilient_cache::CacheConfig;
//! use resilient_cache::backends::{MemoryCache, RedisCache};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CacheConfig::default();
//! let memory = MemoryCache::new();
//! let redis = RedisCache::connect("redis://127.0.0.1:6379", &config).await?;
//! # Ok(())
//! # }
//! ```

pub mod memory_cache;
pub mod redis_cache;

pub use memory_cache::{MemoryCache, MemoryCacheStats};
pub use redis_cache::RedisCache;
