//! Rotating proxy pool
//!
//! The pool is a cheap `Clone` handle; every clone shares one candidate list
//! and one rotation cursor. The cursor is always in `[0, len)` for a
//! non-empty pool and wraps to 0.

use crate::config::{Config, ProxyConfig};
use crate::proxy::{sources, validator, Egress, ProxyCandidate};
use crate::storage::ProxyStore;
use crate::HarvestError;
use chrono::Utc;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use url::Url;

#[derive(Debug, Default)]
struct PoolState {
    candidates: Vec<ProxyCandidate>,
    cursor: usize,
}

struct PoolInner {
    config: ProxyConfig,
    target: Url,
    marker: String,
    store: Arc<dyn ProxyStore>,
    list_client: Client,
    state: Mutex<PoolState>,
    refreshing: AtomicBool,
    last_refill: Mutex<Option<Instant>>,
}

/// Shared, persisted set of validated egress proxies
#[derive(Clone)]
pub struct ProxyPool {
    inner: Arc<PoolInner>,
}

impl ProxyPool {
    /// Creates an empty pool backed by `store`
    ///
    /// Call [`ProxyPool::initialize`] to load persisted candidates.
    pub fn new(config: &Config, store: Arc<dyn ProxyStore>) -> Result<Self, HarvestError> {
        let target = Url::parse(&config.target.base_url)?;

        let list_client = Client::builder()
            .timeout(Duration::from_secs(config.fetch.request_timeout_secs))
            .connect_timeout(config.fetch.connect_timeout())
            .gzip(true)
            .build()?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                config: config.proxy.clone(),
                target,
                marker: config.target.marker.clone(),
                store,
                list_client,
                state: Mutex::new(PoolState::default()),
                refreshing: AtomicBool::new(false),
                last_refill: Mutex::new(None),
            }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.config.enabled
    }

    pub fn len(&self) -> usize {
        self.state().candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current candidates in rotation order
    pub fn snapshot(&self) -> Vec<ProxyCandidate> {
        self.state().candidates.clone()
    }

    /// Loads persisted candidates and refreshes if too few are fresh
    ///
    /// Never fails: any error leaves the pool empty, which means direct
    /// connections.
    pub async fn initialize(&self) {
        if !self.is_enabled() {
            tracing::info!("Proxy use disabled; all requests go out directly");
            return;
        }

        let stored = match self.inner.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Could not load persisted proxies: {}", e);
                Vec::new()
            }
        };

        let now = Utc::now();
        // Unvalidated configs can carry hours chrono cannot represent
        let hours = self.inner.config.freshness_hours.clamp(0, i64::from(u32::MAX));
        let window = chrono::Duration::hours(hours);
        let total = stored.len();
        let fresh: Vec<ProxyCandidate> = stored
            .into_iter()
            .filter(|c| c.working_for_target != Some(false) && c.is_fresh(now, window))
            .collect();

        tracing::info!("Loaded {} fresh proxies ({} stale discarded)", fresh.len(), total - fresh.len());
        self.install(fresh);

        if self.len() < self.inner.config.min_pool_size {
            tracing::info!(
                "Fewer than {} fresh proxies, refreshing pool",
                self.inner.config.min_pool_size
            );
            self.refresh().await;
        }
    }

    /// Rebuilds the pool from the public sources
    ///
    /// Downloads the candidate lists, validates every candidate against the
    /// target and replaces the pool with the survivors. When no source
    /// yielded a single candidate the current pool is kept. A refresh that
    /// is already running makes this call a no-op.
    ///
    /// # Returns
    ///
    /// The pool size afterwards
    pub async fn refresh(&self) -> usize {
        if self
            .inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Proxy refresh already in progress");
            return self.len();
        }

        let size = self.refresh_inner().await;
        self.inner.refreshing.store(false, Ordering::Release);
        size
    }

    async fn refresh_inner(&self) -> usize {
        let config = &self.inner.config;

        let candidates = sources::fetch_candidates(
            &self.inner.list_client,
            &config.sources,
            config.enough_candidates,
            config.max_candidates,
        )
        .await;

        if candidates.is_empty() {
            tracing::warn!("No proxy candidates could be fetched; keeping current pool");
            return self.len();
        }

        tracing::info!("Validating {} proxy candidates", candidates.len());
        let validated = validator::validate_all(
            candidates,
            &self.inner.target,
            &self.inner.marker,
            Duration::from_secs(config.validation_timeout_secs),
            config.validation_concurrency,
        )
        .await;

        if let Err(e) = self.inner.store.replace_all(&validated) {
            tracing::warn!("Could not persist proxy pool: {}", e);
        }

        self.install(validated);
        self.len()
    }

    /// Returns the candidate at the cursor and advances it
    ///
    /// Yields [`Egress::Direct`] when the pool is empty or disabled. Nearing
    /// the end of the pool kicks off a background refill.
    pub fn next(&self) -> Egress {
        if !self.is_enabled() {
            return Egress::Direct;
        }

        let (candidate, low) = {
            let mut state = self.state();
            let len = state.candidates.len();
            if len == 0 {
                return Egress::Direct;
            }

            let candidate = state.candidates[state.cursor].clone();
            state.cursor = (state.cursor + 1) % len;
            let low = state.cursor >= len.saturating_sub(self.inner.config.low_water_mark);
            (candidate, low)
        };

        if low {
            self.spawn_refill();
        }

        Egress::Proxy(candidate)
    }

    /// Permanently evicts `candidate` (matched on address and port)
    ///
    /// Returns true if it was in the pool.
    pub fn mark_failed(&self, candidate: &ProxyCandidate) -> bool {
        let removed = {
            let mut state = self.state();
            match state.candidates.iter().position(|c| c.same_endpoint(candidate)) {
                Some(idx) => {
                    state.candidates.remove(idx);
                    if idx < state.cursor {
                        state.cursor -= 1;
                    }
                    if state.cursor >= state.candidates.len() {
                        state.cursor = 0;
                    }
                    true
                }
                None => false,
            }
        };

        if let Err(e) = self.inner.store.remove(&candidate.address, candidate.port) {
            tracing::warn!("Could not persist eviction of {}: {}", candidate, e);
        }

        if removed {
            tracing::warn!("Evicted proxy {} ({} left)", candidate, self.len());
        }

        removed
    }

    fn spawn_refill(&self) {
        if self.inner.refreshing.load(Ordering::Acquire) {
            return;
        }

        {
            let Ok(mut last) = self.inner.last_refill.lock() else {
                return;
            };
            let cooldown = Duration::from_secs(self.inner.config.refill_cooldown_secs);
            if last.is_some_and(|at| at.elapsed() < cooldown) {
                return;
            }
            *last = Some(Instant::now());
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        tracing::info!("Proxy pool running low, refilling in background");
        let pool = self.clone();
        handle.spawn(async move {
            let size = pool.refresh().await;
            tracing::info!("Background proxy refill finished with {} proxies", size);
        });
    }

    fn install(&self, candidates: Vec<ProxyCandidate>) {
        let mut state = self.state();
        state.candidates = candidates;
        state.cursor = 0;
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyPool")
            .field("enabled", &self.is_enabled())
            .field("len", &self.len())
            .finish()
    }
}
