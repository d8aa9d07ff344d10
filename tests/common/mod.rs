//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - Redis connection helpers
//! - Cache systems running on the in-process store
//! - A remote stand-in whose failures can be switched on and off

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use resilient_cache::{
    CacheBackend, CacheConfig, CacheError, CacheResult, CacheSystem, CacheSystemBuilder, MemoryCache, PipelineOp,
    async_trait,
};

/// Get Redis URL from environment or use default
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Create a test key with unique suffix
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Cache system with no remote configured
pub async fn memory_system() -> CacheSystem {
    CacheSystemBuilder::new().build().await
}

/// Cache system whose remote is `remote`, sharing `fallback` as its store
pub async fn system_with_remote(remote: Arc<FlakyBackend>, fallback: Arc<MemoryCache>, config: CacheConfig) -> CacheSystem {
    CacheSystemBuilder::new()
        .with_config(config)
        .with_remote(remote)
        .with_fallback(fallback)
        .build()
        .await
}

/// Remote backend stand-in
///
/// Delegates to its own in-process store until `fail()` is called, after which
/// every operation reports `BackendUnavailable`. Operation calls are counted;
/// health checks are not.
pub struct FlakyBackend {
    inner: MemoryCache,
    failing: AtomicBool,
    healthy: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryCache::new(),
            failing: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        })
    }

    /// Start with a failed trial health check
    pub fn unhealthy() -> Arc<Self> {
        let backend = Self::new();
        backend.healthy.store(false, Ordering::SeqCst);
        backend
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
        self.healthy.store(false, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
        self.healthy.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The store behind the stand-in, for seeding and inspection
    pub fn inner(&self) -> &MemoryCache {
        &self.inner
    }

    fn guard(&self) -> CacheResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::BackendUnavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FlakyBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        self.guard()?;
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl_secs: u64) -> CacheResult<()> {
        self.guard()?;
        self.inner.set_with_ttl(key, value, ttl_secs).await
    }

    async fn delete(&self, keys: &[&str]) -> CacheResult<usize> {
        self.guard()?;
        self.inner.delete(keys).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.guard()?;
        self.inner.exists(key).await
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        self.guard()?;
        self.inner.ttl(key).await
    }

    async fn increment(&self, key: &str) -> CacheResult<i64> {
        self.guard()?;
        self.inner.increment(key).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<bool> {
        self.guard()?;
        self.inner.expire(key, ttl_secs).await
    }

    async fn persist(&self, key: &str) -> CacheResult<bool> {
        self.guard()?;
        self.inner.persist(key).await
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<HashSet<String>> {
        self.guard()?;
        self.inner.keys_matching(pattern).await
    }

    async fn mget(&self, keys: &[&str]) -> CacheResult<Vec<Option<Bytes>>> {
        self.guard()?;
        self.inner.mget(keys).await
    }

    async fn pipeline_exec(&self, ops: &[PipelineOp]) -> CacheResult<Vec<CacheResult<()>>> {
        self.guard()?;
        self.inner.pipeline_exec(ops).await
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "Flaky"
    }
}

/// Generate test data of various types
pub mod test_data {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Quote {
        pub symbol: String,
        pub close: f64,
        pub volume: u64,
    }

    impl Quote {
        pub fn new(symbol: &str, close: f64) -> Self {
            Self {
                symbol: symbol.to_string(),
                close,
                volume: 1_000,
            }
        }
    }
}
