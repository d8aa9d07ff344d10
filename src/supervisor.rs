//! Connection Supervisor
//!
//! Owns backend selection. The supervisor starts `Active` when a remote backend
//! is reachable at startup and `Degraded` otherwise. The first
//! `BackendUnavailable` reported by the remote demotes it for good: every later
//! call goes straight to the in-process fallback store without paying the
//! remote's timeout again.
//!
//! Re-promotion never happens on its own unless the opt-in re-probe policy
//! (`CacheConfig::reprobe_interval`) is configured; an operator can also force
//! a probe with [`ConnectionSupervisor::try_promote`].
//!
//! No state migrates across a demotion: values written to the remote are not
//! visible in the fallback store and vice versa.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backends::{MemoryCache, RedisCache};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::traits::CacheBackend;

const ACTIVE: u8 = 0;
const DEGRADED: u8 = 1;

/// Which backend the supervisor currently routes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    /// Calls go to the remote backend
    Active,
    /// Calls go to the in-process fallback store
    Degraded,
}

impl BackendState {
    fn from_raw(raw: u8) -> Self {
        if raw == ACTIVE { Self::Active } else { Self::Degraded }
    }
}

/// Snapshot returned by [`ConnectionSupervisor::health`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorHealth {
    pub state: BackendState,
    /// Whether a remote endpoint or backend was supplied at all
    pub remote_configured: bool,
    /// How many times the remote has been demoted in this process
    pub demotions: u64,
    /// Last transport failure seen from the remote
    pub last_failure: Option<String>,
    /// Time spent degraded since the last demotion, if degraded
    pub degraded_for: Option<Duration>,
}

impl SupervisorHealth {
    /// Whether calls are currently served by the fallback store.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.state == BackendState::Degraded
    }
}

/// Two-state backend selector
///
/// The state is a single atomic read on every dispatch. The fallback store is
/// always present; the remote slot is empty when nothing was configured or
/// the startup connection failed.
pub struct ConnectionSupervisor {
    state: AtomicU8,
    remote: RwLock<Option<Arc<dyn CacheBackend>>>,
    fallback: Arc<MemoryCache>,
    config: CacheConfig,
    remote_configured: bool,
    demotions: AtomicU64,
    last_failure: Mutex<Option<String>>,
    degraded_since: Mutex<Option<Instant>>,
    probing: AtomicBool,
}

impl ConnectionSupervisor {
    /// Connect to the remote named by `config`, if any.
    ///
    /// Never fails: an absent endpoint or a failed trial connection simply
    /// starts the supervisor in `Degraded`.
    pub async fn connect(config: CacheConfig, fallback: Arc<MemoryCache>) -> Self {
        let Some(url) = config.remote_endpoint.clone() else {
            info!("No remote cache endpoint configured, using in-process store");
            return Self::assemble(None, fallback, config, false, None);
        };

        match RedisCache::connect(&url, &config).await {
            Ok(cache) => Self::assemble(Some(Arc::new(cache)), fallback, config, true, None),
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(redis_url = %url, error = %reason, "Remote cache unreachable at startup, starting degraded");
                Self::assemble(None, fallback, config, true, Some(reason))
            }
        }
    }

    /// Build a supervisor around an already constructed remote backend.
    ///
    /// The remote is given one `health_check` as its trial connection; if that
    /// fails the supervisor starts `Degraded`.
    pub async fn with_backends(
        remote: Option<Arc<dyn CacheBackend>>,
        fallback: Arc<MemoryCache>,
        config: CacheConfig,
    ) -> Self {
        let configured = remote.is_some();
        let healthy = match &remote {
            Some(backend) => backend.health_check().await,
            None => false,
        };

        let failure = if configured && !healthy {
            warn!(
                backend = remote.as_ref().map_or("unknown", |backend| backend.name()),
                "Remote cache failed its trial health check, starting degraded"
            );
            Some("trial health check failed".to_string())
        } else {
            None
        };

        Self::assemble(remote, fallback, config, configured, failure)
    }

    fn assemble(
        remote: Option<Arc<dyn CacheBackend>>,
        fallback: Arc<MemoryCache>,
        config: CacheConfig,
        remote_configured: bool,
        startup_failure: Option<String>,
    ) -> Self {
        let state = if remote.is_some() && startup_failure.is_none() { ACTIVE } else { DEGRADED };
        let degraded_since = (state == DEGRADED).then(Instant::now);

        info!(
            state = ?BackendState::from_raw(state),
            remote_configured = remote_configured,
            "Connection supervisor initialized"
        );

        Self {
            state: AtomicU8::new(state),
            remote: RwLock::new(remote),
            fallback,
            config,
            remote_configured,
            demotions: AtomicU64::new(0),
            last_failure: Mutex::new(startup_failure),
            degraded_since: Mutex::new(degraded_since),
            probing: AtomicBool::new(false),
        }
    }

    /// Current routing state
    #[must_use]
    pub fn state(&self) -> BackendState {
        BackendState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Whether calls are served by the fallback store
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.state() == BackendState::Degraded
    }

    /// Read-only health snapshot for status reporting
    #[must_use]
    pub fn health(&self) -> SupervisorHealth {
        let state = self.state();
        SupervisorHealth {
            state,
            remote_configured: self.remote_configured,
            demotions: self.demotions.load(Ordering::Relaxed),
            last_failure: self.last_failure.lock().clone(),
            degraded_for: match state {
                BackendState::Active => None,
                BackendState::Degraded => self.degraded_since.lock().map(|since| since.elapsed()),
            },
        }
    }

    /// The in-process fallback store
    #[must_use]
    pub fn fallback(&self) -> &Arc<MemoryCache> {
        &self.fallback
    }

    /// Name of the backend calls are currently routed to
    #[must_use]
    pub fn active_backend_name(&self) -> &'static str {
        match (self.state(), self.remote()) {
            (BackendState::Active, Some(remote)) => remote.name(),
            _ => self.fallback.name(),
        }
    }

    fn remote(&self) -> Option<Arc<dyn CacheBackend>> {
        self.remote.read().clone()
    }

    /// Health-check the backend calls are currently routed to.
    ///
    /// While `Active`, this asks the remote. A remote that fails the check is
    /// demoted just as a failed operation would be, and `false` is returned
    /// for this check; later checks report the fallback store.
    pub async fn health_check(&self) -> bool {
        if !self.is_degraded() {
            if let Some(remote) = self.remote() {
                if remote.health_check().await {
                    return true;
                }
                let reason = CacheError::BackendUnavailable("health check failed".to_string());
                self.demote("health_check", remote.name(), &reason);
                return false;
            }
        }
        self.fallback.health_check().await
    }

    /// Dispatch `call` to the active backend.
    ///
    /// If the remote reports `BackendUnavailable`, the supervisor demotes and
    /// runs `call` once more against the fallback store, so the caller gets a
    /// normal result either way. Any other error is returned as is.
    ///
    /// # Errors
    ///
    /// Returns whatever non-transport error the selected backend reports.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, call: F) -> CacheResult<T>
    where
        F: Fn(Arc<dyn CacheBackend>) -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        if self.is_degraded() {
            self.maybe_reprobe().await;
        }

        if !self.is_degraded() {
            if let Some(remote) = self.remote() {
                let backend = remote.name();
                match call(remote).await {
                    Err(err) if err.is_unavailable() => self.demote(operation, backend, &err),
                    result => return result,
                }
            }
        }

        let fallback: Arc<dyn CacheBackend> = self.fallback.clone();
        call(fallback).await
    }

    fn demote(&self, operation: &str, backend: &str, reason: &CacheError) {
        *self.last_failure.lock() = Some(reason.to_string());

        if self
            .state
            .compare_exchange(ACTIVE, DEGRADED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.demotions.fetch_add(1, Ordering::Relaxed);
            *self.degraded_since.lock() = Some(Instant::now());
            warn!(
                operation = operation,
                backend = backend,
                error = %reason,
                "Remote cache unavailable, demoting to in-process fallback store"
            );
        }
    }

    /// Probe the remote if the re-probe policy is enabled and due.
    async fn maybe_reprobe(&self) {
        let Some(interval) = self.config.reprobe_interval else {
            return;
        };
        let due = self
            .degraded_since
            .lock()
            .is_some_and(|since| since.elapsed() >= interval);
        if !due {
            return;
        }
        if self
            .probing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        debug!(interval = ?interval, "Re-probing remote cache");
        self.try_promote().await;
        self.probing.store(false, Ordering::Release);
    }

    /// Probe the remote and switch back to `Active` if it answers.
    ///
    /// Connects first if the remote was never established. Returns whether the
    /// supervisor is `Active` afterwards. A failed probe restarts the
    /// re-probe interval.
    pub async fn try_promote(&self) -> bool {
        if !self.is_degraded() {
            return true;
        }

        let candidate = match self.remote() {
            Some(remote) => remote,
            None => {
                let Some(url) = self.config.remote_endpoint.as_deref() else {
                    return false;
                };
                match RedisCache::connect(url, &self.config).await {
                    Ok(cache) => {
                        let cache: Arc<dyn CacheBackend> = Arc::new(cache);
                        *self.remote.write() = Some(Arc::clone(&cache));
                        cache
                    }
                    Err(e) => {
                        let reason = format!("{e:#}");
                        warn!(redis_url = %url, error = %reason, "Remote cache still unreachable");
                        *self.last_failure.lock() = Some(reason);
                        *self.degraded_since.lock() = Some(Instant::now());
                        return false;
                    }
                }
            }
        };

        if candidate.health_check().await {
            self.state.store(ACTIVE, Ordering::Release);
            *self.degraded_since.lock() = None;
            info!(backend = candidate.name(), "Remote cache reachable again, promoted to active");
            true
        } else {
            *self.degraded_since.lock() = Some(Instant::now());
            debug!(backend = candidate.name(), "Remote cache probe failed, staying degraded");
            false
        }
    }
}
