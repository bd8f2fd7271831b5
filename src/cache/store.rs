//! TTL cache store with single-flight fetches.

use super::entry::{CacheEntry, EntryState};
use super::key::CacheKey;
use super::loader::Loader;
use crate::{Error, LoadError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: crate::config::DEFAULT_TTL,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Callers that joined a flight someone else started.
    pub coalesced: u64,
    pub loads: u64,
    pub failures: u64,
    pub invalidations: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    loads: AtomicU64,
    failures: AtomicU64,
    invalidations: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

type Flight<T> = Shared<BoxFuture<'static, std::result::Result<T, LoadError>>>;

enum Slot<T> {
    Loading { flight: Flight<T>, ticket: u64 },
    Ready { payload: T, fetched_at: Instant },
    Failed { error: LoadError },
}

enum Lookup<T> {
    Hit(T),
    Joined(Flight<T>),
    Started(Flight<T>),
}

struct Inner<T> {
    config: CacheConfig,
    slots: Mutex<HashMap<CacheKey, Slot<T>>>,
    next_ticket: AtomicU64,
    stats: AtomicStats,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a flight's outcome, unless the key was invalidated or replaced
    /// while the flight was running.
    fn settle(&self, key: &CacheKey, ticket: u64, outcome: &std::result::Result<T, LoadError>)
    where
        T: Clone,
    {
        let mut slots = self.lock();
        let current = matches!(slots.get(key), Some(Slot::Loading { ticket: t, .. }) if *t == ticket);
        match outcome {
            Ok(_) => self.stats.loads.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.stats.failures.fetch_add(1, Ordering::Relaxed),
        };
        if !current {
            trace!(key = %key, ticket, "flight settled after invalidation; result not stored");
            return;
        }
        let slot = match outcome {
            Ok(payload) => {
                debug!(key = %key, "flight settled");
                Slot::Ready {
                    payload: payload.clone(),
                    fetched_at: Instant::now(),
                }
            }
            Err(error) => {
                debug!(key = %key, error = %error, "flight failed");
                Slot::Failed {
                    error: error.clone(),
                }
            }
        };
        slots.insert(key.clone(), slot);
    }
}

/// Erased handle used by the coordinator to reset every cache it handed out.
pub(crate) trait ClearCache: Send + Sync {
    fn clear_all(&self);
}

impl<T: Send + Sync + 'static> ClearCache for Inner<T> {
    fn clear_all(&self) {
        self.lock().clear();
    }
}

/// Keyed TTL cache that collapses concurrent misses into one upstream call.
///
/// Cloning yields another handle to the same store. Expiry is lazy: nothing
/// is swept, a stale entry is simply reloaded on the next fetch.
pub struct TtlCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> TtlCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                slots: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(1),
                stats: AtomicStats::default(),
            }),
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(CacheConfig::new().with_ttl(ttl))
    }

    pub fn ttl(&self) -> Duration {
        self.inner.config.ttl
    }

    /// Return the cached payload if fresh, otherwise load it.
    ///
    /// Concurrent callers for a key that is already loading share the
    /// outstanding flight instead of invoking `loader` again, and all of them
    /// observe the same outcome. Failures are not cached.
    pub async fn fetch(&self, key: &CacheKey, loader: Arc<dyn Loader<T>>) -> Result<T> {
        let flight = match self.lookup_or_start(key, loader) {
            Lookup::Hit(payload) => return Ok(payload),
            Lookup::Joined(flight) | Lookup::Started(flight) => flight,
        };
        flight.await.map_err(Error::Load)
    }

    /// Start loading `key` in the background unless it is fresh or already
    /// loading. Returns `true` when a new flight was started.
    ///
    /// The flight runs to completion even though nobody awaits it; a failure
    /// only leaves a `Failed` entry behind.
    pub fn prefetch(&self, key: &CacheKey, loader: Arc<dyn Loader<T>>) -> bool {
        matches!(self.lookup_or_start(key, loader), Lookup::Started(_))
    }

    /// Synchronous snapshot of a key.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let slots = self.inner.lock();
        let slot = slots.get(key)?;
        let mut entry = CacheEntry::empty(key.clone(), self.inner.config.ttl);
        match slot {
            Slot::Loading { .. } => entry.state = EntryState::Loading,
            Slot::Ready {
                payload,
                fetched_at,
            } => {
                entry.state = EntryState::Ready;
                entry.payload = Some(payload.clone());
                entry.fetched_at = Some(*fetched_at);
            }
            Slot::Failed { error } => {
                entry.state = EntryState::Failed;
                entry.error = Some(error.clone());
            }
        }
        Some(entry)
    }

    /// The payload for `key` if it is ready and within TTL.
    pub fn get_fresh(&self, key: &CacheKey) -> Option<T> {
        let slots = self.inner.lock();
        match slots.get(key) {
            Some(Slot::Ready {
                payload,
                fetched_at,
            }) if fetched_at.elapsed() < self.inner.config.ttl => Some(payload.clone()),
            _ => None,
        }
    }

    /// Store a value fetched elsewhere (e.g. returned by a mutation).
    pub fn insert(&self, key: CacheKey, payload: T) {
        self.inner.lock().insert(
            key,
            Slot::Ready {
                payload,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop `key`. A flight already in progress still resolves its waiters
    /// but its result is not stored.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.inner.lock().remove(key).is_some();
        if removed {
            self.inner.stats.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "cache entry invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        self.inner.clear_all();
        debug!("cache cleared");
    }

    pub fn is_loading(&self, key: &CacheKey) -> bool {
        matches!(self.inner.lock().get(key), Some(Slot::Loading { .. }))
    }

    /// Number of tracked keys, stale and failed entries included.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats.to_stats()
    }

    pub(crate) fn clear_handle(&self) -> Weak<dyn ClearCache> {
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        weak
    }

    fn lookup_or_start(&self, key: &CacheKey, loader: Arc<dyn Loader<T>>) -> Lookup<T> {
        let stats = &self.inner.stats;
        let mut slots = self.inner.lock();
        match slots.get(key) {
            Some(Slot::Ready {
                payload,
                fetched_at,
            }) if fetched_at.elapsed() < self.inner.config.ttl => {
                stats.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "cache hit");
                return Lookup::Hit(payload.clone());
            }
            Some(Slot::Loading { flight, .. }) => {
                stats.coalesced.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "joining in-flight load");
                return Lookup::Joined(flight.clone());
            }
            _ => {}
        }
        stats.misses.fetch_add(1, Ordering::Relaxed);
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, ticket, "cache miss; starting load");
        let flight = self.spawn_flight(key.clone(), ticket, loader);
        slots.insert(
            key.clone(),
            Slot::Loading {
                flight: flight.clone(),
                ticket,
            },
        );
        Lookup::Started(flight)
    }

    // The slot lock is held by the caller; the spawned task cannot settle
    // before the Loading slot is in place.
    fn spawn_flight(&self, key: CacheKey, ticket: u64, loader: Arc<dyn Loader<T>>) -> Flight<T> {
        let inner = Arc::downgrade(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(loader.load(&task_key)).catch_unwind().await {
                Ok(Ok(payload)) => Ok(payload),
                Ok(Err(e)) => Err(e.into_load_error(&task_key)),
                Err(_) => Err(LoadError::for_key(&task_key, "loader panicked")),
            };
            if let Some(inner) = inner.upgrade() {
                inner.settle(&task_key, ticket, &outcome);
            }
            outcome
        });
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(LoadError::for_key(&key, format!("load task aborted: {}", e))),
            }
        }
        .boxed()
        .shared()
    }
}

impl<T> Default for TtlCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
