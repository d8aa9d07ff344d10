//! Cache Client - Unified Cache Operations
//!
//! The facade collaborators use. Every call is forwarded to whichever backend
//! the [`ConnectionSupervisor`] currently designates; values are encoded with
//! the client's [`CacheCodec`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::codecs::JsonCodec;
use crate::error::CacheResult;
use crate::supervisor::{ConnectionSupervisor, SupervisorHealth};
use crate::traits::{CacheCodec, PipelineOp};

/// Unified cache client
///
/// Cheap to clone; clones share the supervisor and codec.
///
/// # Degraded Mode
///
/// After the supervisor demotes the remote backend, every operation keeps
/// working against the in-process fallback store. Values cached remotely
/// before the demotion are not visible there, so reads may miss until the
/// application repopulates them. This is expected staleness, not data
/// corruption: the fallback store is always consistent with this process's
/// own writes.
///
/// # Example
///
/// ```rust,no_run
/// use resilient_cache::CacheSystem;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let cache = CacheSystem::new().await?;
///     let client = cache.cache_client();
///
///     client.set_with_ttl("market_data:AAPL", &vec![189.5, 190.1], 3600).await?;
///     let prices: Option<Vec<f64>> = client.get("market_data:AAPL").await?;
///     assert_eq!(prices, Some(vec![189.5, 190.1]));
///     Ok(())
/// }
/// ```
pub struct CacheClient<C: CacheCodec = JsonCodec> {
    supervisor: Arc<ConnectionSupervisor>,
    codec: Arc<C>,
}

impl<C: CacheCodec> Clone for CacheClient<C> {
    fn clone(&self) -> Self {
        Self {
            supervisor: Arc::clone(&self.supervisor),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<C: CacheCodec> fmt::Debug for CacheClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("backend", &self.supervisor.active_backend_name())
            .field("codec", &self.codec.name())
            .finish()
    }
}

impl CacheClient<JsonCodec> {
    /// Create a client using the JSON codec
    #[must_use]
    pub fn new(supervisor: Arc<ConnectionSupervisor>) -> Self {
        Self::with_codec(supervisor, JsonCodec)
    }
}

impl<C: CacheCodec> CacheClient<C> {
    /// Create a client using a custom codec
    #[must_use]
    pub fn with_codec(supervisor: Arc<ConnectionSupervisor>, codec: C) -> Self {
        Self {
            supervisor,
            codec: Arc::new(codec),
        }
    }

    /// The supervisor this client dispatches through
    #[must_use]
    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    /// Degraded-mode status of the underlying supervisor
    #[must_use]
    pub fn health(&self) -> SupervisorHealth {
        self.supervisor.health()
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, bytes: &[u8]) -> Option<T> {
        match self.codec.deserialize(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    key = %key,
                    codec = self.codec.name(),
                    error = %e,
                    "Cached value failed to decode, treating as absent"
                );
                None
            }
        }
    }

    /// Get and decode the value stored under `key`
    ///
    /// A value that does not decode into `T` is logged and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns an error only if the active backend rejects the call.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let raw = self.get_raw(key).await?;
        Ok(raw.and_then(|bytes| self.decode(key, &bytes)))
    }

    /// Get the undecoded bytes stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error only if the active backend rejects the call.
    pub async fn get_raw(&self, key: &str) -> CacheResult<Option<Bytes>> {
        self.supervisor
            .run("get", move |backend| async move { backend.get(key).await })
            .await
    }

    /// Encode `value` and store it under `key` for `ttl_secs` seconds
    ///
    /// # Errors
    ///
    /// - [`CacheError::Serialization`](crate::CacheError::Serialization) if the value cannot be encoded
    /// - [`CacheError::InvalidArgument`](crate::CacheError::InvalidArgument) if `ttl_secs` is 0
    pub async fn set_with_ttl<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> CacheResult<()> {
        let bytes = self.codec.serialize(value)?;
        self.set_raw(key, bytes, ttl_secs).await
    }

    /// Store raw bytes under `key` for `ttl_secs` seconds
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`](crate::CacheError::InvalidArgument) if `ttl_secs` is 0.
    pub async fn set_raw(&self, key: &str, value: impl Into<Bytes>, ttl_secs: u64) -> CacheResult<()> {
        let value = value.into();
        self.supervisor
            .run("set", move |backend| {
                let value = value.clone();
                async move { backend.set_with_ttl(key, value, ttl_secs).await }
            })
            .await
    }

    /// Delete `keys`, returning how many existed
    ///
    /// # Errors
    ///
    /// Returns an error only if the active backend rejects the call.
    pub async fn del(&self, keys: &[&str]) -> CacheResult<usize> {
        self.supervisor
            .run("del", move |backend| async move { backend.delete(keys).await })
            .await
    }

    /// Whether `key` holds a live value
    ///
    /// # Errors
    ///
    /// Returns an error only if the active backend rejects the call.
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.supervisor
            .run("exists", move |backend| async move { backend.exists(key).await })
            .await
    }

    /// Remaining TTL in seconds: `-2` if missing, `-1` if the key never expires
    ///
    /// # Errors
    ///
    /// Returns an error only if the active backend rejects the call.
    pub async fn ttl(&self, key: &str) -> CacheResult<i64> {
        self.supervisor
            .run("ttl", move |backend| async move { backend.ttl(key).await })
            .await
    }

    /// Atomically increment the counter at `key`
    ///
    /// Creates the key with value 1 and a 60 second TTL when missing.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::TypeMismatch`](crate::CacheError::TypeMismatch) if the stored value is not an integer.
    pub async fn incr(&self, key: &str) -> CacheResult<i64> {
        self.supervisor
            .run("incr", move |backend| async move { backend.increment(key).await })
            .await
    }

    /// Reset the TTL of `key`; returns `false` if the key does not exist
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`](crate::CacheError::InvalidArgument) if `ttl_secs` is 0.
    pub async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<bool> {
        self.supervisor
            .run("expire", move |backend| async move { backend.expire(key, ttl_secs).await })
            .await
    }

    /// Remove the TTL of `key` so it never expires
    ///
    /// # Errors
    ///
    /// Returns an error only if the active backend rejects the call.
    pub async fn persist(&self, key: &str) -> CacheResult<bool> {
        self.supervisor
            .run("persist", move |backend| async move { backend.persist(key).await })
            .await
    }

    /// Live keys matching `pattern` (`*` matches any run of characters)
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`](crate::CacheError::InvalidArgument) for an empty pattern.
    pub async fn keys(&self, pattern: &str) -> CacheResult<HashSet<String>> {
        self.supervisor
            .run("keys", move |backend| async move { backend.keys_matching(pattern).await })
            .await
    }

    /// Get and decode several keys at once, aligned to the input order
    ///
    /// # Errors
    ///
    /// Returns an error only if the active backend rejects the call.
    pub async fn mget<T: DeserializeOwned>(&self, keys: &[&str]) -> CacheResult<Vec<Option<T>>> {
        let raw = self.mget_raw(keys).await?;
        Ok(keys
            .iter()
            .zip(raw)
            .map(|(key, bytes)| bytes.and_then(|bytes| self.decode(key, &bytes)))
            .collect())
    }

    /// Get several keys at once without decoding
    ///
    /// # Errors
    ///
    /// Returns an error only if the active backend rejects the call.
    pub async fn mget_raw(&self, keys: &[&str]) -> CacheResult<Vec<Option<Bytes>>> {
        self.supervisor
            .run("mget", move |backend| async move { backend.mget(keys).await })
            .await
    }

    /// Start a pipeline of writes submitted in one call
    #[must_use]
    pub fn pipeline(&self) -> Pipeline<'_, C> {
        Pipeline {
            client: self,
            ops: Vec::new(),
        }
    }

    /// Submit pre-built pipeline ops in order
    ///
    /// # Errors
    ///
    /// Returns an error only if the active backend rejects the whole batch;
    /// per-op failures are reported in the returned outcomes.
    pub async fn execute_pipeline(&self, ops: &[PipelineOp]) -> CacheResult<Vec<CacheResult<()>>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        debug!(ops = ops.len(), "Submitting pipeline");
        self.supervisor
            .run("pipeline", move |backend| async move { backend.pipeline_exec(ops).await })
            .await
    }
}

/// Ordered batch of writes
///
/// Ops run sequentially in the order they were queued. The batch is not
/// atomic: each op gets its own outcome and a failure does not undo earlier
/// ops.
///
/// ```rust,no_run
/// # async fn example(client: resilient_cache::CacheClient) -> resilient_cache::CacheResult<()> {
/// let outcomes = client
///     .pipeline()
///     .set("a", &1, 60)?
///     .set("b", &2, 60)?
///     .execute()
///     .await?;
/// assert!(outcomes.iter().all(Result::is_ok));
/// # Ok(())
/// # }
/// ```
#[must_use = "a pipeline does nothing until executed"]
pub struct Pipeline<'a, C: CacheCodec = JsonCodec> {
    client: &'a CacheClient<C>,
    ops: Vec<PipelineOp>,
}

impl<C: CacheCodec> Pipeline<'_, C> {
    /// Queue an encoded `set_with_ttl`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`](crate::CacheError::Serialization) if the value cannot be encoded.
    pub fn set<T: Serialize + ?Sized>(mut self, key: impl Into<String>, value: &T, ttl_secs: u64) -> CacheResult<Self> {
        let bytes = self.client.codec.serialize(value)?;
        self.ops.push(PipelineOp::set(key, bytes, ttl_secs));
        Ok(self)
    }

    /// Queue a raw `set_with_ttl`
    pub fn set_raw(mut self, key: impl Into<String>, value: impl Into<Bytes>, ttl_secs: u64) -> Self {
        self.ops.push(PipelineOp::set(key, value, ttl_secs));
        self
    }

    /// Number of queued ops
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Submit the queued ops, returning one outcome per op in queue order
    ///
    /// # Errors
    ///
    /// Returns an error only if the active backend rejects the whole batch.
    pub async fn execute(self) -> CacheResult<Vec<CacheResult<()>>> {
        self.client.execute_pipeline(&self.ops).await
    }
}
