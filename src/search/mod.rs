//! 搜索模块：输入防抖与过期响应丢弃。
//!
//! # Debounced Search Module
//!
//! Converts rapid keystrokes into one backend call per settled query and
//! guarantees that only the newest query's results are ever shown.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`DebouncedSearch`] | Orchestrator: `set_query`, `snapshot`, `subscribe` |
//! | [`SearchSnapshot`] | `{ query, generation, results, loading, error }` for the UI |
//! | [`Searcher`] | Async search backend contract |
//!
//! ## Ordering
//!
//! Responses are matched against the generation that was current when the
//! request left. If the user typed on and a newer query settled, the older
//! response is dropped even when it arrives last.

mod debounce;

pub use debounce::{
    searcher_fn, DebouncedSearch, FnSearcher, SearchOutcome, SearchSnapshot, SearchStats, Searcher,
};
