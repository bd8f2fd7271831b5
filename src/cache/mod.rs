//! 缓存模块：带 TTL 的键值缓存，并合并同一键的并发请求。
//!
//! # TTL Cache & Single-Flight Module
//!
//! Keyed store of fetched values with a time-to-live, where concurrent misses
//! for the same key collapse into a single upstream call.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TtlCache`] | Shared store; `fetch`, `prefetch`, `get`, `invalidate`, `clear` |
//! | [`CacheConfig`] | TTL for one store |
//! | [`CacheEntry`] | Snapshot of a key's payload and [`EntryState`] |
//! | [`Loader`] | Async data-loader contract for one resource kind |
//! | [`CacheKey`] | Resource keys (`user:alice`, `feed:<cursor>`, hashed queries) |
//!
//! ## Lifecycle
//!
//! `Empty → Loading → Ready | Failed`. A `Ready` entry past its TTL and any
//! `Failed` entry behave as `Empty` on the next fetch; entries are removed
//! only through `invalidate` or `clear`.
//!
//! ## Example
//!
//! ```rust
//! use freshline::cache::{loader_fn, CacheKey, TtlCache};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> freshline::Result<()> {
//! let cache: TtlCache<String> = TtlCache::with_ttl(Duration::from_secs(300));
//! let loader = loader_fn(|key: CacheKey| async move { Ok(format!("profile {}", key)) });
//!
//! let profile = cache.fetch(&CacheKey::profile("alice"), loader).await?;
//! assert_eq!(profile, "profile user:alice");
//! # Ok(())
//! # }
//! ```

mod entry;
mod key;
mod loader;
mod store;

pub use entry::{CacheEntry, EntryState};
pub use key::CacheKey;
pub use loader::{loader_fn, FnLoader, Loader};
pub use store::{CacheConfig, CacheStats, TtlCache};

pub(crate) use store::ClearCache;
