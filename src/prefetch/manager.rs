//! Prefetch manager.

use super::hover::{HoverIntent, PrefetchTarget};
use crate::cache::{CacheKey, Loader, TtlCache};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Binds one cache to the loader for one resource kind.
///
/// Prefetches and real fetches go through the same [`TtlCache`], so a
/// navigation that follows a hover joins the flight the hover started.
pub struct PrefetchManager<T> {
    cache: TtlCache<T>,
    loader: Arc<dyn Loader<T>>,
}

impl<T> Clone for PrefetchManager<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            loader: Arc::clone(&self.loader),
        }
    }
}

impl<T> PrefetchManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(cache: TtlCache<T>, loader: Arc<dyn Loader<T>>) -> Self {
        Self { cache, loader }
    }

    pub async fn fetch(&self, key: &CacheKey) -> Result<T> {
        self.cache.fetch(key, Arc::clone(&self.loader)).await
    }

    /// Warm `key` in the background; errors are dropped.
    pub fn prefetch(&self, key: &CacheKey) -> bool {
        let started = self.cache.prefetch(key, Arc::clone(&self.loader));
        if !started {
            trace!(key = %key, "prefetch skipped; entry fresh or already loading");
        }
        started
    }

    pub fn cached(&self, key: &CacheKey) -> Option<T> {
        self.cache.get_fresh(key)
    }

    pub fn cache(&self) -> &TtlCache<T> {
        &self.cache
    }

    /// A hover scheduler that prefetches through this manager.
    pub fn hover_intent(&self, delay: Duration) -> HoverIntent {
        HoverIntent::new(Arc::new(self.clone()), delay)
    }
}

impl<T> PrefetchTarget for PrefetchManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn prefetch(&self, key: &CacheKey) {
        PrefetchManager::<T>::prefetch(self, key);
    }
}
