//! # freshline
//!
//! 客户端数据新鲜度与分页协调器：TTL 缓存、请求合并、悬停预取、无限滚动与防抖搜索。
//!
//! Client-side Data Freshness & Pagination Coordinator.
//!
//! ## Overview
//!
//! UI signals (hover, scroll intersection, keystrokes) reach a scheduler or
//! controller, which consults a shared TTL cache; on a miss the external data
//! loader is invoked once, the result is stored with a timestamp, and every
//! waiting consumer is released with the same outcome.
//!
//! ## Key Features
//!
//! - **TTL cache with single-flight**: [`cache::TtlCache`] never runs two loads for one key
//! - **Hover prefetch**: [`prefetch::HoverIntent`] warms the cache after a sustained hover
//! - **Infinite scroll**: [`scroll::InfiniteScroll`] issues non-overlapping "load more" calls
//! - **Debounced search**: [`search::DebouncedSearch`] drops stale, out-of-order responses
//! - **Explicit composition**: [`Coordinator`] is constructed, never a global
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use freshline::cache::{loader_fn, CacheKey};
//! use freshline::{Coordinator, CoordinatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> freshline::Result<()> {
//!     let coordinator = Coordinator::new(CoordinatorConfig::default())?;
//!     let profiles = coordinator.prefetch_manager(
//!         coordinator.cache::<String>(),
//!         loader_fn(|key: CacheKey| async move { Ok(format!("profile for {}", key)) }),
//!     );
//!
//!     let hover = profiles.hover_intent(coordinator.config().hover_delay);
//!     hover.on_enter(&CacheKey::profile("alice"));
//!
//!     // navigation a moment later reuses the hover's flight or its result
//!     let profile = profiles.fetch(&CacheKey::profile("alice")).await?;
//!     println!("{profile}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL cache store, single-flight coalescer, loader contract |
//! | [`prefetch`] | Hover-intent scheduler and prefetch manager |
//! | [`scroll`] | Infinite-scroll controller, visibility notifier, paginator |
//! | [`search`] | Debounced search with stale-response suppression |
//! | [`config`] | Tunables and their YAML/env loading |

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod prefetch;
pub mod scroll;
pub mod search;

pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, LoadError};
