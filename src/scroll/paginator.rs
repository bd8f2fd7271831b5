//! Cursor pagination state.

use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    pub cursor: Option<String>,
    pub has_more: bool,
    pub loading: bool,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            cursor: None,
            has_more: true,
            loading: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` on the last page.
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait PageLoader<T>: Send + Sync {
    async fn load_page(&self, cursor: Option<&str>) -> Result<Page<T>>;
}

pub struct FnPageLoader<F> {
    func: F,
}

#[async_trait]
impl<T, F, Fut> PageLoader<T> for FnPageLoader<F>
where
    T: Send + 'static,
    F: Fn(Option<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>>> + Send + 'static,
{
    async fn load_page(&self, cursor: Option<&str>) -> Result<Page<T>> {
        (self.func)(cursor.map(str::to_owned)).await
    }
}

pub fn page_loader_fn<T, F, Fut>(func: F) -> Arc<dyn PageLoader<T>>
where
    T: Send + 'static,
    F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page<T>>> + Send + 'static,
{
    Arc::new(FnPageLoader { func })
}

struct Pages<T> {
    state: PaginationState,
    items: Vec<T>,
}

/// Clears `loading` if a `load_next` future is dropped before its page
/// arrives, unless a `reset` happened in between.
struct InFlight<'a, T> {
    pages: &'a Mutex<Pages<T>>,
    epoch: &'a AtomicU64,
    started: u64,
    armed: bool,
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut pages = self.pages.lock().unwrap_or_else(PoisonError::into_inner);
        if self.epoch.load(Ordering::Acquire) == self.started {
            pages.state.loading = false;
            debug!("page load abandoned; next crossing retries");
        }
    }
}

/// Accumulates pages behind a cursor; the data side of an infinite list.
///
/// `load_next` is a no-op while a page is loading or after the last page.
/// A failed or abandoned page leaves `has_more` untouched and clears
/// `loading`, so the next sentinel crossing retries.
pub struct Paginator<T> {
    loader: Arc<dyn PageLoader<T>>,
    pages: Mutex<Pages<T>>,
    epoch: AtomicU64,
}

impl<T> Paginator<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(loader: Arc<dyn PageLoader<T>>) -> Self {
        Self {
            loader,
            pages: Mutex::new(Pages {
                state: PaginationState::default(),
                items: Vec::new(),
            }),
            epoch: AtomicU64::new(0),
        }
    }

    /// Load the page after the current cursor.
    ///
    /// Returns the number of items appended, or `None` if nothing was
    /// requested or the result was dropped because of a concurrent `reset`.
    pub async fn load_next(&self) -> Result<Option<usize>> {
        let (cursor, epoch) = {
            let mut pages = self.lock();
            if pages.state.loading || !pages.state.has_more {
                return Ok(None);
            }
            pages.state.loading = true;
            (pages.state.cursor.clone(), self.epoch.load(Ordering::Acquire))
        };

        let mut in_flight = InFlight {
            pages: &self.pages,
            epoch: &self.epoch,
            started: epoch,
            armed: true,
        };
        let outcome = self.loader.load_page(cursor.as_deref()).await;
        in_flight.armed = false;

        let mut pages = self.lock();
        if self.epoch.load(Ordering::Acquire) != epoch {
            debug!("page arrived after reset; dropped");
            return Ok(None);
        }
        pages.state.loading = false;
        let page = outcome?;
        let appended = page.items.len();
        pages.items.extend(page.items);
        pages.state.has_more = page.next_cursor.is_some();
        pages.state.cursor = page.next_cursor;
        debug!(appended, has_more = pages.state.has_more, "page loaded");
        Ok(Some(appended))
    }

    /// Start over from the first page (e.g. filters changed).
    pub fn reset(&self) {
        let mut pages = self.lock();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        pages.state = PaginationState::default();
        pages.items.clear();
    }

    /// Stop paging without another request.
    pub fn mark_exhausted(&self) {
        self.lock().state.has_more = false;
    }

    pub fn state(&self) -> PaginationState {
        self.lock().state.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Pages<T>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
