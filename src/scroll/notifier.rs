//! Visibility notifier abstraction.

use crate::config::ObserveOptions;
use crate::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque reference to the sentinel element at the end of a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SentinelRef(String);

impl SentinelRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SentinelRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityChange {
    pub is_visible: bool,
}

impl VisibilityChange {
    pub fn visible() -> Self {
        Self { is_visible: true }
    }

    pub fn hidden() -> Self {
        Self { is_visible: false }
    }
}

pub type VisibilityCallback = Arc<dyn Fn(VisibilityChange) + Send + Sync>;

/// Platform hook that reports when a sentinel enters or leaves the viewport.
///
/// One notifier instance serves one controller; `disconnect` drops every
/// observation made through it.
pub trait VisibilityNotifier: Send + Sync {
    fn observe(
        &self,
        sentinel: &SentinelRef,
        options: ObserveOptions,
        on_change: VisibilityCallback,
    ) -> Result<()>;

    fn disconnect(&self);

    /// Synchronous visibility probe used right after registration, so a
    /// sentinel that is already on screen at mount time still triggers.
    /// `None` when the platform cannot tell.
    fn current_visibility(&self, _sentinel: &SentinelRef, _options: ObserveOptions) -> Option<bool> {
        None
    }
}

struct Observation {
    sentinel: SentinelRef,
    options: ObserveOptions,
    on_change: VisibilityCallback,
}

#[derive(Default)]
struct ManualState {
    observations: Vec<Observation>,
    visible: HashMap<SentinelRef, bool>,
    registrations: usize,
}

/// Notifier driven by explicit calls, for headless runtimes and tests.
#[derive(Default)]
pub struct ManualVisibility {
    state: Mutex<ManualState>,
}

impl ManualVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the sentinel's visibility and notify its observers.
    pub fn set_visible(&self, sentinel: &SentinelRef, is_visible: bool) {
        let callbacks: Vec<VisibilityCallback> = {
            let mut st = self.lock();
            st.visible.insert(sentinel.clone(), is_visible);
            st.observations
                .iter()
                .filter(|o| &o.sentinel == sentinel)
                .map(|o| Arc::clone(&o.on_change))
                .collect()
        };
        let change = VisibilityChange { is_visible };
        for cb in callbacks {
            cb(change);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observations.len()
    }

    /// Total `observe` calls since creation.
    pub fn registrations(&self) -> usize {
        self.lock().registrations
    }

    pub fn last_options(&self) -> Option<ObserveOptions> {
        self.lock().observations.last().map(|o| o.options)
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VisibilityNotifier for ManualVisibility {
    fn observe(
        &self,
        sentinel: &SentinelRef,
        options: ObserveOptions,
        on_change: VisibilityCallback,
    ) -> Result<()> {
        let mut st = self.lock();
        st.registrations += 1;
        st.observations.push(Observation {
            sentinel: sentinel.clone(),
            options,
            on_change,
        });
        Ok(())
    }

    fn disconnect(&self) {
        self.lock().observations.clear();
    }

    fn current_visibility(&self, sentinel: &SentinelRef, _options: ObserveOptions) -> Option<bool> {
        self.lock().visible.get(sentinel).copied()
    }
}
