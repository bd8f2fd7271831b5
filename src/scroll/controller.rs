//! Infinite-scroll controller.

use super::notifier::{SentinelRef, VisibilityCallback, VisibilityChange, VisibilityNotifier};
use super::paginator::PaginationState;
use crate::config::ObserveOptions;
use crate::{Error, ErrorContext, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, trace};

pub type LoadMoreFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    Hidden,
    /// `has_more` is false.
    Exhausted,
    /// The consumer reports a load in progress.
    Loading,
    /// A trigger was issued and its load has not been seen to finish.
    Awaiting,
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Triggered,
    Suppressed(SuppressReason),
}

impl TriggerOutcome {
    pub fn is_triggered(&self) -> bool {
        matches!(self, TriggerOutcome::Triggered)
    }
}

/// What the list view needs to render its footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollView {
    pub sentinel: Option<SentinelRef>,
    pub show_loading_row: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollStats {
    pub triggers: u64,
    pub suppressed: u64,
    pub registrations: u64,
}

struct ScrollState {
    has_more: bool,
    loading: bool,
    awaiting: bool,
    /// `loading == true` was reported since the last trigger.
    saw_loading: bool,
    attached: bool,
    sentinel: Option<SentinelRef>,
}

struct Inner {
    notifier: Arc<dyn VisibilityNotifier>,
    options: ObserveOptions,
    on_load_more: LoadMoreFn,
    state: Mutex<ScrollState>,
    triggers: AtomicU64,
    suppressed: AtomicU64,
    registrations: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ScrollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_visibility(&self, change: VisibilityChange) -> TriggerOutcome {
        let reason = {
            let mut st = self.lock();
            let reason = if !st.attached {
                Some(SuppressReason::Detached)
            } else if !change.is_visible {
                Some(SuppressReason::Hidden)
            } else if !st.has_more {
                Some(SuppressReason::Exhausted)
            } else if st.loading {
                Some(SuppressReason::Loading)
            } else if st.awaiting {
                Some(SuppressReason::Awaiting)
            } else {
                None
            };
            if reason.is_none() {
                st.awaiting = true;
                st.saw_loading = false;
            }
            reason
        };

        match reason {
            Some(reason) => {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                trace!(?reason, "load-more trigger suppressed");
                TriggerOutcome::Suppressed(reason)
            }
            None => {
                self.triggers.fetch_add(1, Ordering::Relaxed);
                debug!("sentinel visible; loading more");
                (self.on_load_more)();
                TriggerOutcome::Triggered
            }
        }
    }

    /// Register the current sentinel, then probe whether it is already visible.
    fn arm(self: &Arc<Self>) -> Result<()> {
        let sentinel = match self.lock().sentinel.clone() {
            Some(s) => s,
            None => return Ok(()),
        };
        let weak: Weak<Inner> = Arc::downgrade(self);
        let callback: VisibilityCallback = Arc::new(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_visibility(change);
            }
        });
        self.notifier
            .observe(&sentinel, self.options, callback)
            .map_err(|e| {
                Error::runtime_with_context(
                    "sentinel observation failed",
                    ErrorContext::new()
                        .with_field_path(sentinel.as_str())
                        .with_details(e.to_string())
                        .with_source("infinite_scroll"),
                )
            })?;
        self.registrations.fetch_add(1, Ordering::Relaxed);
        trace!(sentinel = sentinel.as_str(), "sentinel observed");

        if self.notifier.current_visibility(&sentinel, self.options) == Some(true) {
            self.handle_visibility(VisibilityChange::visible());
        }
        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.notifier.disconnect();
    }
}

/// Issues "load more" calls when the sentinel scrolls into view.
///
/// The consumer owns the data logic and reports its `has_more`/`loading`
/// flags through [`update`](Self::update). At most one trigger is
/// outstanding: after firing, the controller waits until it observes
/// `loading` go from true back to false. Once `has_more` is false every visibility event
/// is a no-op, until `has_more` returns to true. Whether a load failed is
/// up to the consumer to express through those flags.
#[derive(Clone)]
pub struct InfiniteScroll {
    inner: Arc<Inner>,
}

impl InfiniteScroll {
    pub fn new(
        notifier: Arc<dyn VisibilityNotifier>,
        options: ObserveOptions,
        on_load_more: LoadMoreFn,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                notifier,
                options,
                on_load_more,
                state: Mutex::new(ScrollState {
                    has_more: true,
                    loading: false,
                    awaiting: false,
                    saw_loading: false,
                    attached: true,
                    sentinel: None,
                }),
                triggers: AtomicU64::new(0),
                suppressed: AtomicU64::new(0),
                registrations: AtomicU64::new(0),
            }),
        }
    }

    /// Point the controller at a (new) sentinel. Re-registers only when the
    /// reference actually changes.
    pub fn set_sentinel(&self, sentinel: Option<SentinelRef>) -> Result<()> {
        {
            let mut st = self.inner.lock();
            if st.sentinel == sentinel {
                return Ok(());
            }
            st.sentinel = sentinel;
            st.attached = true;
        }
        self.inner.notifier.disconnect();
        self.inner.arm()
    }

    /// Sync the consumer's flags.
    ///
    /// The wait for the previous trigger ends once `loading` has been
    /// reported true and then false; a re-sync with unchanged idle flags
    /// keeps the gate closed. A `has_more` flip from false to true (e.g.
    /// filters reset) re-arms the observation and ends any wait.
    pub fn update(&self, has_more: bool, loading: bool) -> Result<()> {
        let rearm = {
            let mut st = self.inner.lock();
            let rearm = !st.has_more && has_more && st.attached;
            st.has_more = has_more;
            st.loading = loading;
            if loading {
                st.saw_loading = true;
            } else if st.saw_loading || rearm {
                st.awaiting = false;
            }
            rearm
        };
        if rearm {
            debug!("more items available again; re-arming sentinel");
            self.inner.notifier.disconnect();
            self.inner.arm()?;
        }
        Ok(())
    }

    pub fn sync(&self, state: &PaginationState) -> Result<()> {
        self.update(state.has_more, state.loading)
    }

    pub fn handle_visibility(&self, change: VisibilityChange) -> TriggerOutcome {
        self.inner.handle_visibility(change)
    }

    pub fn view(&self) -> ScrollView {
        let st = self.inner.lock();
        ScrollView {
            sentinel: st.sentinel.clone(),
            show_loading_row: st.has_more,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.inner.lock().awaiting
    }

    /// Stop observing; later events are ignored until `set_sentinel`.
    pub fn detach(&self) {
        self.inner.lock().attached = false;
        self.inner.notifier.disconnect();
    }

    pub fn stats(&self) -> ScrollStats {
        ScrollStats {
            triggers: self.inner.triggers.load(Ordering::Relaxed),
            suppressed: self.inner.suppressed.load(Ordering::Relaxed),
            registrations: self.inner.registrations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scroll::ManualVisibility;
    use std::sync::atomic::AtomicUsize;

    fn controller() -> (Arc<ManualVisibility>, InfiniteScroll, Arc<AtomicUsize>) {
        let notifier = Arc::new(ManualVisibility::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let scroll = InfiniteScroll::new(
            notifier.clone(),
            ObserveOptions::default(),
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (notifier, scroll, calls)
    }

    #[test]
    fn test_triggers_once_until_loading_observed_false() {
        let (notifier, scroll, calls) = controller();
        let end = SentinelRef::new("end");
        scroll.set_sentinel(Some(end.clone())).unwrap();

        notifier.set_visible(&end, true);
        notifier.set_visible(&end, true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(scroll.is_awaiting());
        assert_eq!(
            scroll.handle_visibility(VisibilityChange::visible()),
            TriggerOutcome::Suppressed(SuppressReason::Awaiting)
        );

        scroll.update(true, true).unwrap();
        assert_eq!(
            scroll.handle_visibility(VisibilityChange::visible()),
            TriggerOutcome::Suppressed(SuppressReason::Loading)
        );

        scroll.update(true, false).unwrap();
        assert!(scroll.handle_visibility(VisibilityChange::visible()).is_triggered());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_idle_resync_keeps_gate_closed() {
        let (notifier, scroll, calls) = controller();
        let end = SentinelRef::new("end");
        scroll.set_sentinel(Some(end.clone())).unwrap();

        notifier.set_visible(&end, true);
        // the view re-renders before the consumer marks itself loading
        scroll.update(true, false).unwrap();
        notifier.set_visible(&end, true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(scroll.is_awaiting());

        scroll.update(true, true).unwrap();
        scroll.update(true, false).unwrap();
        assert!(!scroll.is_awaiting());
        notifier.set_visible(&end, true);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hidden_events_do_nothing() {
        let (_notifier, scroll, calls) = controller();
        assert_eq!(
            scroll.handle_visibility(VisibilityChange::hidden()),
            TriggerOutcome::Suppressed(SuppressReason::Hidden)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_same_sentinel_is_not_reregistered() {
        let (notifier, scroll, _calls) = controller();
        scroll.set_sentinel(Some(SentinelRef::new("a"))).unwrap();
        scroll.set_sentinel(Some(SentinelRef::new("a"))).unwrap();
        scroll.update(true, false).unwrap();
        scroll.update(true, true).unwrap();
        assert_eq!(notifier.registrations(), 1);

        scroll.set_sentinel(Some(SentinelRef::new("b"))).unwrap();
        assert_eq!(notifier.registrations(), 2);
        assert_eq!(notifier.observer_count(), 1);
        assert_eq!(scroll.stats().registrations, 2);
    }

    #[test]
    fn test_initial_visibility_checked_at_registration() {
        let (notifier, scroll, calls) = controller();
        let end = SentinelRef::new("end");
        notifier.set_visible(&end, true);
        scroll.set_sentinel(Some(end)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rearm_when_more_returns() {
        let (notifier, scroll, calls) = controller();
        let end = SentinelRef::new("end");
        scroll.set_sentinel(Some(end.clone())).unwrap();
        scroll.update(false, false).unwrap();
        notifier.set_visible(&end, true);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!scroll.view().show_loading_row);

        // filters reset while the sentinel is on screen
        scroll.update(true, false).unwrap();
        assert_eq!(notifier.registrations(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(scroll.view().show_loading_row);
    }

    #[test]
    fn test_detach_ignores_events() {
        let (notifier, scroll, calls) = controller();
        let end = SentinelRef::new("end");
        scroll.set_sentinel(Some(end.clone())).unwrap();
        scroll.detach();
        assert_eq!(notifier.observer_count(), 0);
        assert_eq!(
            scroll.handle_visibility(VisibilityChange::visible()),
            TriggerOutcome::Suppressed(SuppressReason::Detached)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct Unobservable;

    impl VisibilityNotifier for Unobservable {
        fn observe(
            &self,
            _sentinel: &SentinelRef,
            _options: ObserveOptions,
            _on_change: VisibilityCallback,
        ) -> Result<()> {
            Err(Error::configuration_with_context(
                "no viewport",
                ErrorContext::new().with_source("headless"),
            ))
        }

        fn disconnect(&self) {}
    }

    #[test]
    fn test_observe_failure_is_runtime_error() {
        let scroll = InfiniteScroll::new(
            Arc::new(Unobservable),
            ObserveOptions::default(),
            Arc::new(|| {}),
        );
        let err = scroll.set_sentinel(Some(SentinelRef::new("end"))).unwrap_err();
        match &err {
            Error::Runtime { context, .. } => {
                assert_eq!(context.source.as_deref(), Some("infinite_scroll"));
                assert_eq!(context.field_path.as_deref(), Some("end"));
                assert!(context.details.as_deref().unwrap().contains("no viewport"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(scroll.stats().registrations, 0);
    }

    #[test]
    fn test_drop_disconnects() {
        let (notifier, scroll, _calls) = controller();
        scroll.set_sentinel(Some(SentinelRef::new("end"))).unwrap();
        assert_eq!(notifier.observer_count(), 1);
        drop(scroll);
        assert_eq!(notifier.observer_count(), 0);
    }
}
