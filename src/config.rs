//! Cache Configuration
//!
//! All settings are injected into [`CacheSystemBuilder`](crate::CacheSystemBuilder)
//! through [`CacheConfig`]. `CacheConfig::from_env` reads the same variables a
//! deployment would set; nothing else in the crate looks at the environment.

use std::time::Duration;

use anyhow::{Context, Result};

/// Env var holding the Redis endpoint. Unset means "start degraded".
pub const ENV_REMOTE_ENDPOINT: &str = "REDIS_URL";
/// Env var for the connect timeout, in milliseconds.
pub const ENV_CONNECT_TIMEOUT_MS: &str = "CACHE_CONNECT_TIMEOUT_MS";
/// Env var for the per-command timeout, in milliseconds.
pub const ENV_COMMAND_TIMEOUT_MS: &str = "CACHE_COMMAND_TIMEOUT_MS";
/// Env var for the number of attempts per remote command.
pub const ENV_MAX_ATTEMPTS: &str = "CACHE_MAX_ATTEMPTS";
/// Env var enabling periodic re-probing of a demoted remote, in seconds.
pub const ENV_REPROBE_INTERVAL_SECS: &str = "CACHE_REPROBE_INTERVAL_SECS";

/// Configuration for the cache system
///
/// Timeouts default to low single-digit seconds so that a dead remote is
/// detected, and demoted, quickly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Redis connection string (e.g., `redis://localhost:6379`); `None` starts degraded
    pub remote_endpoint: Option<String>,
    /// Upper bound for establishing the remote connection, PING included
    pub connect_timeout: Duration,
    /// Upper bound for a single remote command round trip
    pub command_timeout: Duration,
    /// Attempts per remote command before reporting the backend unavailable
    pub max_attempts: u32,
    /// When set, a degraded supervisor re-probes the remote after this long
    pub reprobe_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            remote_endpoint: None,
            connect_timeout: Duration::from_millis(2000),
            command_timeout: Duration::from_millis(1000),
            max_attempts: 1,
            reprobe_interval: None,
        }
    }
}

impl CacheConfig {
    /// Build the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read_u64 = |name: &str| -> Result<Option<u64>> {
            lookup(name)
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .with_context(|| format!("{name} must be a non-negative integer, got {raw:?}"))
                })
                .transpose()
        };

        let remote_endpoint = lookup(ENV_REMOTE_ENDPOINT)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let max_attempts = match read_u64(ENV_MAX_ATTEMPTS)? {
            Some(0) => anyhow::bail!("{ENV_MAX_ATTEMPTS} must be at least 1"),
            Some(n) => u32::try_from(n).with_context(|| format!("{ENV_MAX_ATTEMPTS} is too large"))?,
            None => defaults.max_attempts,
        };

        Ok(Self {
            remote_endpoint,
            connect_timeout: read_u64(ENV_CONNECT_TIMEOUT_MS)?
                .map_or(defaults.connect_timeout, Duration::from_millis),
            command_timeout: read_u64(ENV_COMMAND_TIMEOUT_MS)?
                .map_or(defaults.command_timeout, Duration::from_millis),
            max_attempts,
            reprobe_interval: read_u64(ENV_REPROBE_INTERVAL_SECS)?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }

    /// Set the remote endpoint
    #[must_use]
    pub fn with_remote(mut self, endpoint: impl Into<String>) -> Self {
        self.remote_endpoint = Some(endpoint.into());
        self
    }

    /// Enable periodic re-probing of a demoted remote
    #[must_use]
    pub fn with_reprobe_interval(mut self, interval: Duration) -> Self {
        self.reprobe_interval = Some(interval);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = CacheConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CacheConfig::default());
        assert!(config.remote_endpoint.is_none());
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn reads_all_variables() {
        let config = CacheConfig::from_lookup(lookup(&[
            (ENV_REMOTE_ENDPOINT, "redis://cache:6379"),
            (ENV_CONNECT_TIMEOUT_MS, "500"),
            (ENV_COMMAND_TIMEOUT_MS, "250"),
            (ENV_MAX_ATTEMPTS, "2"),
            (ENV_REPROBE_INTERVAL_SECS, "300"),
        ]))
        .unwrap();

        assert_eq!(config.remote_endpoint.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.command_timeout, Duration::from_millis(250));
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.reprobe_interval, Some(Duration::from_secs(300)));
    }

    #[test]
    fn blank_endpoint_means_no_remote() {
        let config = CacheConfig::from_lookup(lookup(&[(ENV_REMOTE_ENDPOINT, "  ")])).unwrap();
        assert!(config.remote_endpoint.is_none());
    }

    #[test]
    fn rejects_garbage_and_zero_attempts() {
        assert!(CacheConfig::from_lookup(lookup(&[(ENV_COMMAND_TIMEOUT_MS, "soon")])).is_err());
        assert!(CacheConfig::from_lookup(lookup(&[(ENV_MAX_ATTEMPTS, "0")])).is_err());
    }
}
