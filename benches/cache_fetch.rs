//! Benchmarks for the TTL cache
//!
//! This benchmark measures:
//! - Fresh-hit fetch path
//! - Coalesced misses (many callers, one load)
//! - Hashed key construction for parameterized queries

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use freshline::cache::{loader_fn, CacheKey, TtlCache};
use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
}

fn bench_fresh_hit(c: &mut Criterion) {
    let rt = runtime();
    let cache: TtlCache<String> = TtlCache::with_ttl(Duration::from_secs(300));
    let loader = loader_fn(|key: CacheKey| async move { Ok(key.to_string()) });
    let key = CacheKey::profile("alice");
    rt.block_on(cache.fetch(&key, loader.clone())).expect("warm");

    c.bench_function("fetch_fresh_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cache.fetch(&key, loader.clone()).await.unwrap()) })
    });
}

fn bench_coalesced_miss(c: &mut Criterion) {
    let rt = runtime();
    let loader = loader_fn(|key: CacheKey| async move {
        tokio::task::yield_now().await;
        Ok(key.to_string())
    });

    let mut group = c.benchmark_group("coalesced_miss");
    for callers in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(callers), &callers, |b, &n| {
            b.to_async(&rt).iter(|| async {
                let cache: TtlCache<String> = TtlCache::default();
                let key = CacheKey::feed(None);
                let waits = (0..n).map(|_| cache.fetch(&key, loader.clone()));
                black_box(futures::future::join_all(waits).await)
            })
        });
    }
    group.finish();
}

fn bench_hashed_key(c: &mut Criterion) {
    let params = serde_json::json!({"tag": "rust", "sort": "new", "filters": {"media": true, "lang": "en"}});
    c.bench_function("cache_key_hashed", |b| {
        b.iter(|| black_box(CacheKey::hashed("feed", black_box(&params))))
    });
}

criterion_group!(benches, bench_fresh_hit, bench_coalesced_miss, bench_hashed_key);
criterion_main!(benches);
