//! Hover-intent scheduler.

use crate::cache::CacheKey;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Something that can warm a key speculatively.
pub trait PrefetchTarget: Send + Sync {
    fn prefetch(&self, key: &CacheKey);
}

impl<F> PrefetchTarget for F
where
    F: Fn(&CacheKey) + Send + Sync,
{
    fn prefetch(&self, key: &CacheKey) {
        self(key)
    }
}

/// The single timer a scheduler may hold.
#[derive(Debug)]
pub enum TimerSlot {
    Idle,
    Pending {
        key: CacheKey,
        ticket: u64,
        handle: JoinHandle<()>,
    },
}

impl TimerSlot {
    fn take(&mut self) -> TimerSlot {
        std::mem::replace(self, TimerSlot::Idle)
    }

    fn is_ticket(&self, expected: u64) -> bool {
        matches!(self, TimerSlot::Pending { ticket, .. } if *ticket == expected)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoverStats {
    pub scheduled: u64,
    pub fired: u64,
    pub cancelled: u64,
}

#[derive(Default)]
struct Counters {
    scheduled: AtomicU64,
    fired: AtomicU64,
    cancelled: AtomicU64,
}

struct TimerState {
    slot: TimerSlot,
    next_ticket: u64,
}

/// Turns a sustained hover or focus into one prefetch.
///
/// A pointer that merely passes over an element never triggers a load: the
/// prefetch fires only if `on_leave` does not arrive within `delay`. A new
/// `on_enter` restarts the window. Timers are Tokio tasks, so these methods
/// must be called from within a runtime.
pub struct HoverIntent {
    target: Arc<dyn PrefetchTarget>,
    delay: Duration,
    state: Arc<Mutex<TimerState>>,
    counters: Arc<Counters>,
}

impl HoverIntent {
    pub fn new(target: Arc<dyn PrefetchTarget>, delay: Duration) -> Self {
        Self {
            target,
            delay,
            state: Arc::new(Mutex::new(TimerState {
                slot: TimerSlot::Idle,
                next_ticket: 1,
            })),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn on_enter(&self, key: &CacheKey) {
        let mut st = lock(&self.state);
        if let TimerSlot::Pending { handle, .. } = st.slot.take() {
            handle.abort();
        }
        let ticket = st.next_ticket;
        st.next_ticket += 1;

        let state = Arc::clone(&self.state);
        let target = Arc::clone(&self.target);
        let counters = Arc::clone(&self.counters);
        let delay = self.delay;
        let fire_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let fire = {
                let mut st = lock(&state);
                if st.slot.is_ticket(ticket) {
                    st.slot = TimerSlot::Idle;
                    true
                } else {
                    false
                }
            };
            if fire {
                counters.fired.fetch_add(1, Ordering::Relaxed);
                debug!(key = %fire_key, "hover intent confirmed; prefetching");
                target.prefetch(&fire_key);
            }
        });
        st.slot = TimerSlot::Pending {
            key: key.clone(),
            ticket,
            handle,
        };
        self.counters.scheduled.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, delay_ms = delay.as_millis() as u64, "hover timer started");
    }

    /// Cancel the pending timer if it belongs to `key`.
    pub fn on_leave(&self, key: &CacheKey) {
        let mut st = lock(&self.state);
        let owns = matches!(&st.slot, TimerSlot::Pending { key: pending, .. } if pending == key);
        if owns {
            if let TimerSlot::Pending { handle, .. } = st.slot.take() {
                handle.abort();
                self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "hover ended early; prefetch cancelled");
            }
        }
    }

    /// Keyboard focus counts as hover.
    pub fn on_focus(&self, key: &CacheKey) {
        self.on_enter(key);
    }

    pub fn on_blur(&self, key: &CacheKey) {
        self.on_leave(key);
    }

    /// Cancel whatever is pending, regardless of key.
    pub fn cancel(&self) {
        if let TimerSlot::Pending { handle, .. } = lock(&self.state).slot.take() {
            handle.abort();
            self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(lock(&self.state).slot, TimerSlot::Pending { .. })
    }

    pub fn pending_key(&self) -> Option<CacheKey> {
        match &lock(&self.state).slot {
            TimerSlot::Pending { key, .. } => Some(key.clone()),
            TimerSlot::Idle => None,
        }
    }

    pub fn stats(&self) -> HoverStats {
        HoverStats {
            scheduled: self.counters.scheduled.load(Ordering::Relaxed),
            fired: self.counters.fired.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
        }
    }
}

impl Drop for HoverIntent {
    fn drop(&mut self) {
        if let TimerSlot::Pending { handle, .. } = lock(&self.state).slot.take() {
            handle.abort();
        }
    }
}

fn lock(state: &Mutex<TimerState>) -> MutexGuard<'_, TimerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
