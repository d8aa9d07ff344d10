//! Cache Backend Traits
//!
//! This module defines the trait abstractions shared by the remote and the
//! in-process backends, plus the pluggable value codec.
//!
//! # Architecture
//!
//! - `CacheCodec`: Trait for pluggable serialization backends
//! - `CacheBackend`: The capability interface every backend implements
//! - `PipelineOp`: One queued write inside a pipeline batch
//!
//! # Example: Custom Backend
//!
//! ```rust,ignore
//! use resilient_cache::{CacheBackend, CacheResult, PipelineOp, async_trait};
//! use bytes::Bytes;
//! use std::collections::HashSet;
//!
//! struct MyCustomCache {
//!     // Your implementation
//! }
//!
//! #[async_trait]
//! impl CacheBackend for MyCustomCache {
//!     async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
//!         // Your implementation
//!     }
//!
//!     // ... the remaining operations
//! }
//! ```

use std::collections::HashSet;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheResult;

/// Trait for cache value serialization/deserialization
///
/// Values are stored as opaque bytes; the codec decides how a typed value maps
/// onto them. Integer counters written by `increment` are plain ASCII decimal,
/// so a codec whose integer encoding is ASCII decimal (JSON) can read them back
/// as numbers.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync + Debug` to support concurrent access
/// across async tasks and provide debugging capabilities.
///
/// # Example: Custom Codec
///
/// ```rust,ignore
/// use resilient_cache::{CacheCodec, CacheError, CacheResult};
/// use serde::{Serialize, de::DeserializeOwned};
///
/// #[derive(Debug)]
/// struct MyCustomCodec;
///
/// impl CacheCodec for MyCustomCodec {
///     fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CacheResult<Vec<u8>> {
///         mycodec::serialize(value).map_err(|e| CacheError::Serialization(e.to_string()))
///     }
///
///     fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CacheResult<T> {
///         mycodec::deserialize(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
///     }
///
///     fn name(&self) -> &'static str {
///         "mycodec"
///     }
/// }
/// ```
pub trait CacheCodec: Send + Sync + Debug {
    /// Serialize a value to bytes
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`](crate::CacheError::Serialization)
    /// if the value cannot be represented by this codec.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CacheResult<Vec<u8>>;

    /// Deserialize bytes to a value
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialization`](crate::CacheError::Serialization)
    /// if the bytes do not decode into `T`.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CacheResult<T>;

    /// Get the name of the codec, used for logging.
    fn name(&self) -> &'static str;
}

/// A single write queued in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOp {
    /// `set_with_ttl(key, value, ttl_secs)`
    Set {
        key: String,
        value: Bytes,
        ttl_secs: u64,
    },
}

impl PipelineOp {
    /// Create a `Set` op.
    #[must_use]
    pub fn set(key: impl Into<String>, value: impl Into<Bytes>, ttl_secs: u64) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
            ttl_secs,
        }
    }

    /// The key this op writes.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } => key,
        }
    }
}

/// Core cache backend trait
///
/// This is the capability interface both the remote (Redis) and the fallback
/// (in-process) backends implement. The supervisor and client only ever talk
/// to backends through it, which is also what lets tests inject a backend that
/// fails on demand.
///
/// # TTL Semantics
///
/// - TTLs are whole seconds and must be at least 1
/// - `ttl` returns `-2` for a missing or expired key, `-1` for a key with no
///   expiration, otherwise the seconds remaining
/// - An entry at or past its expiry is absent for every read operation
///
/// # Failure Semantics
///
/// Transport failures must be reported as
/// [`CacheError::BackendUnavailable`](crate::CacheError::BackendUnavailable);
/// the supervisor keys demotion off that variant.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to support concurrent access across
/// async tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the raw value for `key`, `None` if missing or expired.
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>>;

    /// Store `value` under `key`, replacing any previous entry.
    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl_secs: u64) -> CacheResult<()>;

    /// Delete the given keys, returning how many existed.
    async fn delete(&self, keys: &[&str]) -> CacheResult<usize>;

    /// Whether `key` currently holds a live value.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Remaining TTL in seconds (`-2` missing, `-1` no expiry).
    async fn ttl(&self, key: &str) -> CacheResult<i64>;

    /// Atomically add one to the integer stored at `key`.
    ///
    /// A missing key is created with value `1` and a TTL of
    /// [`DEFAULT_INCREMENT_TTL_SECS`]; an existing key keeps its TTL.
    async fn increment(&self, key: &str) -> CacheResult<i64>;

    /// Reset the TTL of `key`. Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<bool>;

    /// Remove the TTL of `key`. Returns `false` when the key does not exist
    /// or had no TTL.
    async fn persist(&self, key: &str) -> CacheResult<bool>;

    /// Live keys matching `pattern`, where `*` matches any run of characters.
    async fn keys_matching(&self, pattern: &str) -> CacheResult<HashSet<String>>;

    /// Values for `keys`, aligned to the input order.
    async fn mget(&self, keys: &[&str]) -> CacheResult<Vec<Option<Bytes>>>;

    /// Run `ops` in order. Not atomic: each op gets its own outcome and a
    /// failed op does not roll back earlier ones.
    async fn pipeline_exec(&self, ops: &[PipelineOp]) -> CacheResult<Vec<CacheResult<()>>>;

    /// Check if the backend is reachable and operational.
    async fn health_check(&self) -> bool;

    /// Get the name of this cache backend, used for logging.
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// TTL applied by `increment` when it creates a key.
pub const DEFAULT_INCREMENT_TTL_SECS: u64 = 60;

/// Longest accepted TTL, 100 years. Larger values are `InvalidArgument`.
pub const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;
