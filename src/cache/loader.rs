//! Data-loader contract.

use super::key::CacheKey;
use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Upstream source for one resource kind.
///
/// Called at most once per cache miss. Failures must be returned as `Err`,
/// never encoded in `T`.
#[async_trait]
pub trait Loader<T>: Send + Sync {
    async fn load(&self, key: &CacheKey) -> Result<T>;
}

pub struct FnLoader<F> {
    func: F,
}

impl<F> FnLoader<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<T, F, Fut> Loader<T> for FnLoader<F>
where
    T: Send + 'static,
    F: Fn(CacheKey) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    async fn load(&self, key: &CacheKey) -> Result<T> {
        (self.func)(key.clone()).await
    }
}

/// Wrap an async closure as a shareable loader.
pub fn loader_fn<T, F, Fut>(func: F) -> Arc<dyn Loader<T>>
where
    T: Send + 'static,
    F: Fn(CacheKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(FnLoader::new(func))
}
