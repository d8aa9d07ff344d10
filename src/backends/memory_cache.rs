//! Memory Cache - In-Process Fallback Backend
//!
//! A `HashMap` behind one store-wide lock, used when no remote endpoint is
//! configured or after the supervisor demotes the remote backend.
//!
//! Expiration is lazy: there is no sweeper task. Every read path checks the
//! entry's deadline and drops stale entries it touches, so expired values are
//! never observable even though they may linger in memory until next accessed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult, ensure_ttl};
use crate::pattern::KeyPattern;
use crate::traits::{CacheBackend, DEFAULT_INCREMENT_TTL_SECS, PipelineOp};

/// Cache entry with expiration tracking
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Bytes, ttl_secs: u64) -> Self {
        Self {
            value,
            expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
        }
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Remaining whole seconds, rounded up so a fresh `ttl = t` entry reports `t`.
    fn remaining_secs(&self, now: Instant) -> i64 {
        match self.expires_at {
            None => -1,
            Some(expires_at) => {
                let millis = expires_at.saturating_duration_since(now).as_millis();
                i64::try_from(millis.div_ceil(1000)).unwrap_or(i64::MAX)
            }
        }
    }
}

/// Drop `key` from `map` if its entry has expired, returning the live entry.
fn live_entry<'a>(
    map: &'a mut HashMap<String, CacheEntry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut CacheEntry> {
    if map.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
        map.remove(key);
        debug!(key = %key, "[Memory] Evicted expired key on access");
        return None;
    }
    map.get_mut(key)
}

fn parse_counter(value: &[u8]) -> CacheResult<i64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| CacheError::TypeMismatch("value is not an integer".to_string()))
}

/// In-process cache with lazy TTL expiration
///
/// **Use Case**: fallback store for the connection supervisor, and a
/// standalone backend for tests or single-process deployments
///
/// **Features**:
/// - Single `parking_lot::Mutex` over the whole map: every operation on a key
///   is linearized, so concurrent `increment` calls never lose an update
/// - Lazy expiration, no background task
/// - Never suspends: each operation is one short critical section
///
/// **Limitations**:
/// - No size limits or eviction policy beyond TTL
/// - Process-lifetime only; contents are lost on restart
///
/// **Example**:
/// ```rust
/// use resilient_cache::backends::MemoryCache;
/// use resilient_cache::traits::CacheBackend;
///
/// # async fn example() -> resilient_cache::CacheResult<()> {
/// let cache = MemoryCache::new();
///
/// cache.set_with_ttl("user:1", "alice".into(), 60).await?;
/// let cached = cache.get("user:1").await?;
/// assert_eq!(cached.as_deref(), Some(&b"alice"[..]));
/// # Ok(())
/// # }
/// ```
pub struct MemoryCache {
    /// Fallback store
    map: Mutex<HashMap<String, CacheEntry>>,
    /// Hit counter
    hits: Arc<AtomicU64>,
    /// Miss counter
    misses: Arc<AtomicU64>,
    /// Set counter
    sets: Arc<AtomicU64>,
}

impl MemoryCache {
    /// Create new, empty memory cache
    #[must_use]
    pub fn new() -> Self {
        info!("Initializing Memory Cache (in-process fallback store)");

        Self {
            map: Mutex::new(HashMap::new()),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Remove every expired entry now.
    ///
    /// Never called by this crate; expiration is enforced lazily on access.
    /// Long-running processes with many write-once keys may call it to
    /// reclaim memory.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.map.lock();
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - map.len();
        if removed > 0 {
            debug!(count = removed, "[Memory] Purged expired entries");
        }
        removed
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.map.lock().clear();
        debug!("[Memory] Cleared store");
    }

    /// Number of stored entries, including expired ones not yet touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// Check if the store holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Hit/miss/set counters
    #[must_use]
    pub fn stats(&self) -> MemoryCacheStats {
        MemoryCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            size: self.len(),
        }
    }

    fn read(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        let mut map = self.map.lock();
        let value = live_entry(&mut map, key, now).map(|entry| entry.value.clone());
        drop(map);

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    fn write(&self, key: &str, value: Bytes, ttl_secs: u64) -> CacheResult<()> {
        ensure_ttl(ttl_secs)?;
        self.map
            .lock()
            .insert(key.to_string(), CacheEntry::new(value, ttl_secs));
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, ttl_secs = ttl_secs, "[Memory] Cached key with TTL");
        Ok(())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Memory cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub size: usize,
}

// ===== Trait Implementations =====

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        Ok(self.read(key))
    }

    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl_secs: u64) -> CacheResult<()> {
        self.write(key, value, ttl_secs)
    }

    async fn delete(&self, keys: &[&str]) -> CacheResult<usize> {
        let now = Instant::now();
        let mut map = self.map.lock();
        let removed = keys
            .iter()
            .filter_map(|key| map.remove(*key))
            .filter(|entry| !entry.is_expired_at(now))
            .count();
        drop(map);

        debug!(count = removed, "[Memory] Removed keys");
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        Ok(live_entry(&mut self.map.lock(), key, now).is_some())
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        let now = Instant::now();
        Ok(live_entry(&mut self.map.lock(), key, now).map_or(-2, |entry| entry.remaining_secs(now)))
    }

    async fn increment(&self, key: &str) -> CacheResult<i64> {
        let now = Instant::now();
        let mut map = self.map.lock();

        let next = match live_entry(&mut map, key, now) {
            Some(entry) => {
                let next = parse_counter(&entry.value)?
                    .checked_add(1)
                    .ok_or_else(|| CacheError::TypeMismatch("increment would overflow".to_string()))?;
                entry.value = Bytes::from(next.to_string());
                next
            }
            None => {
                map.insert(
                    key.to_string(),
                    CacheEntry::new(Bytes::from_static(b"1"), DEFAULT_INCREMENT_TTL_SECS),
                );
                1
            }
        };
        drop(map);

        debug!(key = %key, value = next, "[Memory] Incremented counter");
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<bool> {
        ensure_ttl(ttl_secs)?;
        let now = Instant::now();
        let mut map = self.map.lock();
        let Some(entry) = live_entry(&mut map, key, now) else {
            return Ok(false);
        };
        entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
        Ok(true)
    }

    async fn persist(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        let mut map = self.map.lock();
        Ok(live_entry(&mut map, key, now).is_some_and(|entry| entry.expires_at.take().is_some()))
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<HashSet<String>> {
        let pattern = KeyPattern::parse(pattern)?;
        let now = Instant::now();
        let mut map = self.map.lock();

        let mut keys = HashSet::new();
        map.retain(|key, entry| {
            if entry.is_expired_at(now) {
                return false;
            }
            if pattern.matches(key) {
                keys.insert(key.clone());
            }
            true
        });
        drop(map);

        debug!(pattern = %pattern.as_str(), count = keys.len(), "[Memory] Scanned keys matching pattern");
        Ok(keys)
    }

    async fn mget(&self, keys: &[&str]) -> CacheResult<Vec<Option<Bytes>>> {
        let now = Instant::now();
        let mut map = self.map.lock();
        let values = keys
            .iter()
            .map(|key| live_entry(&mut map, key, now).map(|entry| entry.value.clone()))
            .collect();
        Ok(values)
    }

    async fn pipeline_exec(&self, ops: &[PipelineOp]) -> CacheResult<Vec<CacheResult<()>>> {
        let outcomes = ops
            .iter()
            .map(|op| match op {
                PipelineOp::Set {
                    key,
                    value,
                    ttl_secs,
                } => self.write(key, value.clone(), *ttl_secs),
            })
            .collect();
        Ok(outcomes)
    }

    /// The store does no I/O; reachable means the lock can be taken.
    async fn health_check(&self) -> bool {
        drop(self.map.lock());
        true
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}
