//! freshline-demo: 演示缓存合并、悬停预取、无限滚动与防抖搜索
//!
//! Usage:
//!   freshline-demo [--config <path>]     Run every scenario against simulated loaders
//!   freshline-demo cache|hover|scroll|search [--config <path>]
//!
//! Logging follows `RUST_LOG` (default `freshline=debug`).

use anyhow::{bail, Context};
use freshline::cache::{loader_fn, CacheKey};
use freshline::scroll::{page_loader_fn, ManualVisibility, Page, Paginator, SentinelRef};
use freshline::search::searcher_fn;
use freshline::{Coordinator, CoordinatorConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("freshline=debug")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut scenario = "all".to_string();
    let mut config_path = None;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => config_path = Some(it.next().context("--config needs a path")?.clone()),
            "help" | "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            s @ ("all" | "cache" | "hover" | "scroll" | "search") => scenario = s.to_string(),
            other => bail!("unknown argument: {other}"),
        }
    }

    let config = match config_path {
        Some(path) => CoordinatorConfig::from_file(&path)
            .with_context(|| format!("loading {path}"))?
            .apply_env_overrides(),
        None => CoordinatorConfig::from_env()?,
    };
    let coordinator = Coordinator::new(config)?;

    if matches!(scenario.as_str(), "all" | "cache") {
        demo_cache(&coordinator).await?;
    }
    if matches!(scenario.as_str(), "all" | "hover") {
        demo_hover(&coordinator).await?;
    }
    if matches!(scenario.as_str(), "all" | "scroll") {
        demo_scroll(&coordinator).await?;
    }
    if matches!(scenario.as_str(), "all" | "search") {
        demo_search(&coordinator).await?;
    }
    coordinator.reset();
    Ok(())
}

fn print_usage() {
    println!(
        r#"freshline-demo: data freshness coordinator walkthrough

USAGE:
    freshline-demo [SCENARIO] [--config <path>]

SCENARIOS:
    all       Run every scenario (default)
    cache     Two concurrent fetches share one load
    hover     Short hover is ignored, sustained hover prefetches
    scroll    Sentinel visibility drives paging until the feed ends
    search    Fast typing sends one request, for the last query

ENVIRONMENT:
    RUST_LOG                      Log filter (default freshline=debug)
    FRESHLINE_TTL_MS              Cache TTL
    FRESHLINE_HOVER_DELAY_MS      Hover delay
    FRESHLINE_SEARCH_DEBOUNCE_MS  Search debounce"#
    );
}

async fn demo_cache(coordinator: &Coordinator) -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let loader = loader_fn(move |key: CacheKey| {
        c.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            Ok(format!("profile<{}>", key))
        }
    });
    let cache = coordinator.cache::<String>();
    let key = CacheKey::profile("alice");
    let (a, b) = tokio::join!(cache.fetch(&key, loader.clone()), cache.fetch(&key, loader.clone()));
    println!("cache: {} / {} with {} load(s)", a?, b?, calls.load(Ordering::SeqCst));
    println!("cache: stats {:?}", cache.stats());
    Ok(())
}

async fn demo_hover(coordinator: &Coordinator) -> anyhow::Result<()> {
    let loader = loader_fn(|key: CacheKey| async move { Ok(format!("profile<{}>", key)) });
    let profiles = coordinator.prefetch_manager(coordinator.cache::<String>(), loader);
    let hover = profiles.hover_intent(coordinator.config().hover_delay);
    let delay = coordinator.config().hover_delay;

    let brief = CacheKey::profile("bob");
    hover.on_enter(&brief);
    tokio::time::sleep(delay / 3).await;
    hover.on_leave(&brief);

    let sustained = CacheKey::profile("carol");
    hover.on_enter(&sustained);
    tokio::time::sleep(delay + Duration::from_millis(50)).await;

    println!(
        "hover: bob cached={} carol cached={}",
        profiles.cached(&brief).is_some(),
        profiles.cached(&sustained).is_some()
    );
    Ok(())
}

async fn demo_scroll(coordinator: &Coordinator) -> anyhow::Result<()> {
    let pages = page_loader_fn(|cursor: Option<String>| async move {
        let n: u32 = cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(Page {
            items: (0..5).map(|i| format!("post {}", n * 5 + i)).collect::<Vec<_>>(),
            next_cursor: (n < 2).then(|| (n + 1).to_string()),
        })
    });
    let paginator = Arc::new(Paginator::new(pages));
    let notifier = Arc::new(ManualVisibility::new());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let scroll = coordinator.infinite_scroll(
        notifier.clone(),
        Arc::new(move || {
            let _ = tx.send(());
        }),
    );
    let sentinel = SentinelRef::new("feed-end");
    scroll.set_sentinel(Some(sentinel.clone()))?;

    loop {
        notifier.set_visible(&sentinel, true);
        if rx.try_recv().is_err() {
            break;
        }
        scroll.update(paginator.state().has_more, true)?;
        if let Err(e) = paginator.load_next().await {
            println!("scroll: page failed: {e}");
        }
        scroll.sync(&paginator.state())?;
        notifier.set_visible(&sentinel, false);
    }
    println!(
        "scroll: {} items, stats {:?}",
        paginator.len(),
        scroll.stats()
    );
    Ok(())
}

async fn demo_search(coordinator: &Coordinator) -> anyhow::Result<()> {
    let searcher = searcher_fn(|q: String| async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        Ok(vec![format!("{q} tutorial"), format!("{q} docs")])
    });
    let search = coordinator.debounced_search(searcher);
    let mut rx = search.subscribe();

    for text in ["r", "re", "rea", "react"] {
        search.set_query(text);
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    let snap = rx
        .wait_for(|s| !s.loading && s.results.is_some())
        .await
        .context("search orchestrator dropped")?
        .clone();
    println!(
        "search: {:?} -> {:?} ({} request(s))",
        snap.query,
        snap.results.unwrap_or_default(),
        search.stats().requests
    );
    Ok(())
}
