//! Cache Error Taxonomy
//!
//! Operation-level errors shared by every backend, the supervisor, the client
//! and the rate limiter. Bootstrap and configuration code uses `anyhow`
//! instead; these variants are what a caller can match on.

use thiserror::Error;

use crate::traits::MAX_TTL_SECS;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors produced by cache operations.
///
/// `BackendUnavailable` is consumed by the
/// [`ConnectionSupervisor`](crate::supervisor::ConnectionSupervisor): it
/// triggers demotion and a retry against the fallback store, so callers of
/// [`CacheClient`](crate::client::CacheClient) never observe it in practice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Transport, timeout or protocol failure against the remote backend.
    #[error("cache backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The caller passed a bad argument (TTL below one second, empty pattern, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `increment` hit a value that is not an integer, or would overflow.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A value could not be encoded or decoded by the configured codec.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// Whether this error means the backend itself is unreachable.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }

    pub(crate) fn invalid_ttl(ttl_secs: u64) -> Self {
        Self::InvalidArgument(format!(
            "ttl must be between 1 and {MAX_TTL_SECS} seconds, got {ttl_secs}"
        ))
    }
}

/// Reject TTLs that would expire immediately or overflow a deadline.
pub(crate) fn ensure_ttl(ttl_secs: u64) -> CacheResult<()> {
    if ttl_secs == 0 || ttl_secs > MAX_TTL_SECS {
        return Err(CacheError::invalid_ttl(ttl_secs));
    }
    Ok(())
}
