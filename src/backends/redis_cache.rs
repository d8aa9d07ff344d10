//! Redis Cache - Remote Backend
//!
//! Redis-based distributed cache. Every command runs under the configured
//! command timeout, and every transport-level failure is reported as
//! [`CacheError::BackendUnavailable`] so the supervisor can demote.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, RedisResult, Script};
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult, ensure_ttl};
use crate::pattern::KeyPattern;
use crate::traits::{CacheBackend, DEFAULT_INCREMENT_TTL_SECS, PipelineOp};

/// `INCR`, plus the default TTL when the key was just created, in one step.
const INCREMENT_SCRIPT: &str = r"
local value = redis.call('INCR', KEYS[1])
if value == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return value
";

/// Map a Redis error onto the cache taxonomy.
///
/// Server replies about integer parsing or wrong value types are the caller's
/// problem; everything else (I/O, refused, dropped, protocol) means the remote
/// cannot be relied on.
fn classify(command: &str, err: &RedisError) -> CacheError {
    classify_message(command, err.to_string())
}

fn classify_message(command: &str, message: String) -> CacheError {
    if message.contains("invalid expire time") {
        CacheError::InvalidArgument(message)
    } else if message.contains("not an integer") || message.contains("WRONGTYPE") || message.contains("overflow") {
        CacheError::TypeMismatch(message)
    } else {
        CacheError::BackendUnavailable(format!("{command} failed: {message}"))
    }
}

/// Redis distributed cache with `ConnectionManager`
///
/// This is the remote backend selected while the supervisor is `Active`:
/// - Connection established and PINGed within the connect timeout
/// - Each command bounded by the command timeout
/// - Optional bounded retry (`max_attempts`, default 1 = no retry)
/// - Cursor-based `SCAN` for pattern queries
pub struct RedisCache {
    /// Redis connection manager
    conn_manager: ConnectionManager,
    /// Atomic INCR-with-default-TTL script
    increment_script: Script,
    command_timeout: Duration,
    max_attempts: u32,
    /// Hit counter
    hits: Arc<AtomicU64>,
    /// Miss counter
    misses: Arc<AtomicU64>,
    /// Set counter
    sets: Arc<AtomicU64>,
}

impl RedisCache {
    /// Connect to `redis_url` using the timeouts from `config`
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection string (e.g., `<redis://localhost:6379>`)
    /// * `config` - Connect/command timeouts and retry cap
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, or the connection or its PING
    /// does not complete within `config.connect_timeout`.
    pub async fn connect(redis_url: &str, config: &CacheConfig) -> Result<Self> {
        info!(redis_url = %redis_url, "Initializing Redis Cache with ConnectionManager");

        let client = Client::open(redis_url)
            .with_context(|| format!("Failed to create Redis client with URL: {redis_url}"))?;

        let handshake = async {
            let conn_manager = ConnectionManager::new(client)
                .await
                .context("Failed to establish Redis connection manager")?;

            let mut conn = conn_manager.clone();
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .context("Redis PING health check failed")?;

            anyhow::Ok(conn_manager)
        };

        let conn_manager = tokio::time::timeout(config.connect_timeout, handshake)
            .await
            .with_context(|| {
                format!(
                    "Redis connection to {redis_url} timed out after {:?}",
                    config.connect_timeout
                )
            })??;

        info!(redis_url = %redis_url, "Redis Cache connected successfully");

        Ok(Self {
            conn_manager,
            increment_script: Script::new(INCREMENT_SCRIPT),
            command_timeout: config.command_timeout,
            max_attempts: config.max_attempts.max(1),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Run one command with the timeout and retry policy applied.
    async fn run<T, F, Fut>(&self, command: &'static str, mut call: F) -> CacheResult<T>
    where
        F: FnMut(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            let err = match tokio::time::timeout(self.command_timeout, call(self.conn_manager.clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => classify(command, &e),
                Err(_) => CacheError::BackendUnavailable(format!(
                    "{command} timed out after {:?}",
                    self.command_timeout
                )),
            };

            if !err.is_unavailable() {
                return Err(err);
            }
            debug!(command = command, attempt = attempt, error = %err, "[Redis] Command failed");
            last_error = Some(err);
        }

        Err(last_error.unwrap_or_else(|| CacheError::BackendUnavailable(format!("{command} was not attempted"))))
    }

    /// Hit/miss/set counters
    #[must_use]
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.sets.load(Ordering::Relaxed),
        )
    }
}

// ===== Trait Implementations =====

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        let value: Option<Vec<u8>> = self
            .run("GET", |mut conn| async move {
                redis::cmd("GET").arg(key).query_async(&mut conn).await
            })
            .await?;

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value.map(Bytes::from))
    }

    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl_secs: u64) -> CacheResult<()> {
        ensure_ttl(ttl_secs)?;
        let payload: &[u8] = &value;

        let _: () = self
            .run("SET", |mut conn| async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(payload)
                    .arg("EX")
                    .arg(ttl_secs)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, ttl_secs = ttl_secs, "[Redis] Cached key with TTL");
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> CacheResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let count: usize = self
            .run("DEL", |mut conn| async move {
                redis::cmd("DEL").arg(keys).query_async(&mut conn).await
            })
            .await?;

        debug!(count = count, "[Redis] Removed keys");
        Ok(count)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let count: i64 = self
            .run("EXISTS", |mut conn| async move {
                redis::cmd("EXISTS").arg(key).query_async(&mut conn).await
            })
            .await?;
        Ok(count > 0)
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        self.run("TTL", |mut conn| async move {
            redis::cmd("TTL").arg(key).query_async(&mut conn).await
        })
        .await
    }

    async fn increment(&self, key: &str) -> CacheResult<i64> {
        let script = &self.increment_script;
        let value: i64 = self
            .run("INCR", |mut conn| async move {
                script
                    .key(key)
                    .arg(DEFAULT_INCREMENT_TTL_SECS)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;

        debug!(key = %key, value = value, "[Redis] Incremented counter");
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<bool> {
        ensure_ttl(ttl_secs)?;
        let updated: i64 = self
            .run("EXPIRE", |mut conn| async move {
                redis::cmd("EXPIRE").arg(key).arg(ttl_secs).query_async(&mut conn).await
            })
            .await?;
        Ok(updated == 1)
    }

    async fn persist(&self, key: &str) -> CacheResult<bool> {
        let updated: i64 = self
            .run("PERSIST", |mut conn| async move {
                redis::cmd("PERSIST").arg(key).query_async(&mut conn).await
            })
            .await?;
        Ok(updated == 1)
    }

    /// Cursor-based `SCAN MATCH`, safe for production use unlike `KEYS`.
    async fn keys_matching(&self, pattern: &str) -> CacheResult<HashSet<String>> {
        let pattern = KeyPattern::parse(pattern)?;
        let glob = pattern.to_redis_glob();
        let glob = glob.as_str();
        let mut keys = HashSet::new();
        let mut cursor: u64 = 0;

        loop {
            // SCAN cursor MATCH pattern COUNT 100
            let (next, batch): (u64, Vec<String>) = self
                .run("SCAN", |mut conn| async move {
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(glob)
                        .arg("COUNT")
                        .arg(100)
                        .query_async(&mut conn)
                        .await
                })
                .await?;

            cursor = next;
            keys.extend(batch);

            // Cursor 0 means iteration is complete
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern.as_str(), count = keys.len(), "[Redis] Scanned keys matching pattern");
        Ok(keys)
    }

    async fn mget(&self, keys: &[&str]) -> CacheResult<Vec<Option<Bytes>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Option<Vec<u8>>> = self
            .run("MGET", |mut conn| async move {
                redis::cmd("MGET").arg(keys).query_async(&mut conn).await
            })
            .await?;

        Ok(values.into_iter().map(|value| value.map(Bytes::from)).collect())
    }

    async fn pipeline_exec(&self, ops: &[PipelineOp]) -> CacheResult<Vec<CacheResult<()>>> {
        let mut outcomes = Vec::with_capacity(ops.len());
        let mut pipe = redis::pipe();
        let mut queued = 0usize;

        for op in ops {
            match op {
                PipelineOp::Set {
                    key,
                    value,
                    ttl_secs,
                } => {
                    let outcome = ensure_ttl(*ttl_secs);
                    if outcome.is_ok() {
                        pipe.cmd("SET")
                            .arg(key.as_str())
                            .arg(value.as_ref())
                            .arg("EX")
                            .arg(*ttl_secs)
                            .ignore();
                        queued += 1;
                    }
                    outcomes.push(outcome);
                }
            }
        }

        if queued > 0 {
            let pipe = &pipe;
            let _: () = self
                .run("PIPELINE", |mut conn| async move { pipe.query_async(&mut conn).await })
                .await?;
            self.sets.fetch_add(queued as u64, Ordering::Relaxed);
        }

        debug!(ops = ops.len(), queued = queued, "[Redis] Executed pipeline");
        Ok(outcomes)
    }

    async fn health_check(&self) -> bool {
        let pong: CacheResult<String> = self
            .run("PING", |mut conn| async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await;
        pong.is_ok()
    }

    fn name(&self) -> &'static str {
        "Redis"
    }
}
