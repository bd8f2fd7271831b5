//! Debounced search orchestrator.

use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[async_trait]
pub trait Searcher<T>: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<T>>;
}

pub struct FnSearcher<F> {
    func: F,
}

#[async_trait]
impl<T, F, Fut> Searcher<T> for FnSearcher<F>
where
    T: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    async fn search(&self, query: &str) -> Result<Vec<T>> {
        (self.func)(query.to_owned()).await
    }
}

pub fn searcher_fn<T, F, Fut>(func: F) -> Arc<dyn Searcher<T>>
where
    T: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    Arc::new(FnSearcher { func })
}

/// What the search box renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSnapshot<T> {
    /// Latest text as typed, untrimmed.
    pub query: String,
    /// Bumped on every settled query and on every clear.
    pub generation: u64,
    pub results: Option<Vec<T>>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for SearchSnapshot<T> {
    fn default() -> Self {
        Self {
            query: String::new(),
            generation: 0,
            results: None,
            loading: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Applied,
    /// A newer query settled while this response was in flight.
    Discarded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub requests: u64,
    pub applied: u64,
    pub discarded: u64,
}

struct Core<T> {
    snapshot: SearchSnapshot<T>,
    timer: Option<JoinHandle<()>>,
    timer_ticket: u64,
}

struct Inner<T> {
    searcher: Arc<dyn Searcher<T>>,
    debounce: Duration,
    core: Mutex<Core<T>>,
    tx: watch::Sender<SearchSnapshot<T>>,
    requests: AtomicU64,
    applied: AtomicU64,
    discarded: AtomicU64,
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Core<T>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, core: &Core<T>) {
        self.tx.send_replace(core.snapshot.clone());
    }

    /// The debounce window for `ticket` elapsed: issue its request.
    fn settle(&self, ticket: u64) -> Option<(u64, String)> {
        let mut core = self.lock();
        if core.timer_ticket != ticket {
            return None;
        }
        core.timer = None;
        core.snapshot.generation += 1;
        core.snapshot.loading = true;
        core.snapshot.error = None;
        self.publish(&core);
        self.requests.fetch_add(1, Ordering::Relaxed);
        let query = core.snapshot.query.trim().to_owned();
        debug!(generation = core.snapshot.generation, query = %query, "search query settled");
        Some((core.snapshot.generation, query))
    }

    fn apply(&self, generation: u64, outcome: Result<Vec<T>>) -> SearchOutcome {
        let mut core = self.lock();
        if core.snapshot.generation != generation {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            trace!(
                generation,
                current = core.snapshot.generation,
                "stale search response discarded"
            );
            return SearchOutcome::Discarded;
        }
        match outcome {
            Ok(results) => {
                core.snapshot.results = Some(results);
                core.snapshot.error = None;
            }
            Err(e) => {
                debug!(generation, error = %e, "search failed");
                core.snapshot.results = None;
                core.snapshot.error = Some(e.to_string());
            }
        }
        core.snapshot.loading = false;
        self.publish(&core);
        self.applied.fetch_add(1, Ordering::Relaxed);
        SearchOutcome::Applied
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = core.timer.take() {
            timer.abort();
        }
    }
}

/// Debounces query text and surfaces only the newest query's results.
///
/// Each settled query gets a fresh generation; a response tagged with an
/// older generation is dropped on arrival, so an out-of-order network reply
/// never overwrites newer results. Requests already sent are not aborted.
/// Must be driven from within a Tokio runtime.
pub struct DebouncedSearch<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DebouncedSearch<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> DebouncedSearch<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(searcher: Arc<dyn Searcher<T>>, debounce: Duration) -> Self {
        let (tx, _rx) = watch::channel(SearchSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                searcher,
                debounce,
                core: Mutex::new(Core {
                    snapshot: SearchSnapshot::default(),
                    timer: None,
                    timer_ticket: 0,
                }),
                tx,
                requests: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
            }),
        }
    }

    /// Record new query text and restart the debounce window.
    ///
    /// Blank text clears results immediately and sends nothing; responses
    /// still in flight become stale.
    pub fn set_query(&self, text: &str) {
        let mut core = self.inner.lock();
        core.snapshot.query = text.to_owned();
        core.timer_ticket += 1;
        if let Some(timer) = core.timer.take() {
            timer.abort();
        }

        if text.trim().is_empty() {
            core.snapshot.generation += 1;
            core.snapshot.results = None;
            core.snapshot.loading = false;
            core.snapshot.error = None;
            self.inner.publish(&core);
            trace!("search cleared");
            return;
        }

        let ticket = core.timer_ticket;
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        let debounce = self.inner.debounce;
        core.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let (generation, query, searcher) = match weak.upgrade() {
                Some(inner) => match inner.settle(ticket) {
                    Some((generation, query)) => {
                        (generation, query, Arc::clone(&inner.searcher))
                    }
                    None => return,
                },
                None => return,
            };
            let outcome = searcher.search(&query).await;
            if let Some(inner) = weak.upgrade() {
                inner.apply(generation, outcome);
            }
        }));
        self.inner.publish(&core);
    }

    /// Abort the pending debounce and orphan any request in flight.
    pub fn cancel(&self) {
        let mut core = self.inner.lock();
        core.timer_ticket += 1;
        if let Some(timer) = core.timer.take() {
            timer.abort();
        }
        if core.snapshot.loading {
            core.snapshot.generation += 1;
            core.snapshot.loading = false;
        }
        self.inner.publish(&core);
    }

    pub fn snapshot(&self) -> SearchSnapshot<T> {
        self.inner.lock().snapshot.clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot<T>> {
        self.inner.tx.subscribe()
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    pub fn stats(&self) -> SearchStats {
        SearchStats {
            requests: self.inner.requests.load(Ordering::Relaxed),
            applied: self.inner.applied.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
        }
    }
}
