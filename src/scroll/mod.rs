//! 无限滚动模块：基于哨兵元素可见性的分页加载控制。
//!
//! # Infinite Scroll Module
//!
//! Drives "load next page" calls from the visibility of a sentinel element at
//! the end of a list, with no overlapping or duplicate triggers.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`InfiniteScroll`] | Controller turning visibility events into `load_more` calls |
//! | [`VisibilityNotifier`] | Platform abstraction: `observe`, `disconnect`, initial probe |
//! | [`ManualVisibility`] | Notifier driven by explicit calls (headless runtimes, tests) |
//! | [`Paginator`] | Cursor/`has_more`/`loading` state plus accumulated items |
//! | [`PageLoader`] | Async contract returning one [`Page`] per cursor |
//!
//! ## Wiring
//!
//! The controller never awaits anything itself. Its `load_more` callback
//! hands off to the consumer, which reports progress back through
//! [`InfiniteScroll::update`] or [`InfiniteScroll::sync`]:
//!
//! ```rust
//! use freshline::config::ObserveOptions;
//! use freshline::scroll::{InfiniteScroll, ManualVisibility, SentinelRef};
//! use std::sync::Arc;
//!
//! let notifier = Arc::new(ManualVisibility::new());
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let scroll = InfiniteScroll::new(
//!     notifier.clone(),
//!     ObserveOptions::default(),
//!     Arc::new(move || {
//!         let _ = tx.send(());
//!     }),
//! );
//! scroll.set_sentinel(Some(SentinelRef::new("feed-end"))).unwrap();
//!
//! notifier.set_visible(&SentinelRef::new("feed-end"), true);
//! notifier.set_visible(&SentinelRef::new("feed-end"), true);
//! assert!(rx.try_recv().is_ok());
//! assert!(rx.try_recv().is_err()); // second event suppressed
//! ```

mod controller;
mod notifier;
mod paginator;

pub use controller::{
    InfiniteScroll, LoadMoreFn, ScrollStats, ScrollView, SuppressReason, TriggerOutcome,
};
pub use notifier::{
    ManualVisibility, SentinelRef, VisibilityCallback, VisibilityChange, VisibilityNotifier,
};
pub use paginator::{page_loader_fn, FnPageLoader, Page, PageLoader, PaginationState, Paginator};
