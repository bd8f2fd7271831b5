//! Composition root.
//!
//! One [`Coordinator`] is built at application start and handed to whatever
//! needs a cache, a hover scheduler, a scroll controller or a search box.
//! There is no global instance; tests build their own and call
//! [`Coordinator::reset`] between cases.

use crate::cache::{CacheConfig, ClearCache, Loader, TtlCache};
use crate::config::CoordinatorConfig;
use crate::prefetch::{HoverIntent, PrefetchManager, PrefetchTarget};
use crate::scroll::{InfiniteScroll, LoadMoreFn, VisibilityNotifier};
use crate::search::{DebouncedSearch, Searcher};
use crate::Result;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

pub struct Coordinator {
    config: CoordinatorConfig,
    caches: Mutex<Vec<Weak<dyn ClearCache>>>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            caches: Mutex::new(Vec::new()),
        })
    }

    /// Coordinator with defaults overridden from `FRESHLINE_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::new(CoordinatorConfig::from_env()?)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// A new cache for one resource type, using the configured TTL.
    pub fn cache<T>(&self) -> TtlCache<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let cache = TtlCache::new(CacheConfig::new().with_ttl(self.config.ttl));
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        caches.retain(|c| c.strong_count() > 0);
        caches.push(cache.clear_handle());
        cache
    }

    pub fn prefetch_manager<T>(&self, cache: TtlCache<T>, loader: Arc<dyn Loader<T>>) -> PrefetchManager<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        PrefetchManager::new(cache, loader)
    }

    pub fn hover_intent(&self, target: Arc<dyn PrefetchTarget>) -> HoverIntent {
        HoverIntent::new(target, self.config.hover_delay)
    }

    pub fn infinite_scroll(
        &self,
        notifier: Arc<dyn VisibilityNotifier>,
        on_load_more: LoadMoreFn,
    ) -> InfiniteScroll {
        InfiniteScroll::new(notifier, self.config.observe_options(), on_load_more)
    }

    pub fn debounced_search<T>(&self, searcher: Arc<dyn Searcher<T>>) -> DebouncedSearch<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        DebouncedSearch::new(searcher, self.config.search_debounce)
    }

    /// Clear every cache created through [`cache`](Self::cache).
    pub fn reset(&self) {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        caches.retain(|c| match c.upgrade() {
            Some(cache) => {
                cache.clear_all();
                true
            }
            None => false,
        });
        debug!(caches = caches.len(), "coordinator reset");
    }
}
