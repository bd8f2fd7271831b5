//! 预取模块：悬停意图调度与缓存预热。
//!
//! # Hover Prefetch Module
//!
//! Speculative loading driven by hover or focus intent.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`HoverIntent`] | Fires a prefetch once a hover has lasted past the delay |
//! | [`TimerSlot`] | The scheduler's single timer: `Idle` or `Pending` |
//! | [`PrefetchManager`] | Binds a [`crate::cache::TtlCache`] to a loader for one resource kind |
//! | [`PrefetchTarget`] | Anything that can warm a key; closures included |
//!
//! ```rust
//! use freshline::cache::{loader_fn, CacheKey, TtlCache};
//! use freshline::prefetch::PrefetchManager;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let loader = loader_fn(|key: CacheKey| async move { Ok(key.to_string()) });
//! let profiles: PrefetchManager<String> = PrefetchManager::new(TtlCache::default(), loader);
//! let hover = profiles.hover_intent(Duration::from_millis(300));
//!
//! hover.on_enter(&CacheKey::profile("alice"));
//! // pointer leaves quickly: nothing is loaded
//! hover.on_leave(&CacheKey::profile("alice"));
//! # }
//! ```

mod hover;
mod manager;

pub use hover::{HoverIntent, HoverStats, PrefetchTarget, TimerSlot};
pub use manager::PrefetchManager;
