//! Single-flight and TTL behaviour of the shared cache.

use freshline::cache::{loader_fn, CacheKey, EntryState, Loader, TtlCache};
use freshline::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    username: String,
    followers: u32,
}

fn profile_loader(calls: Arc<AtomicUsize>, latency: Duration) -> Arc<dyn Loader<Profile>> {
    loader_fn(move |key: CacheKey| {
        let calls = calls.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
            tokio::time::sleep(latency).await;
            Ok(Profile {
                username: key.as_str().trim_start_matches("user:").to_string(),
                followers: 100 + n,
            })
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_share_one_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache: TtlCache<Profile> = TtlCache::default();
    let loader = profile_loader(calls.clone(), Duration::from_millis(50));
    let key = CacheKey::profile("alice");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            let loader = loader.clone();
            let key = key.clone();
            tokio::spawn(async move { cache.fetch(&key, loader).await })
        })
        .collect();

    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap().unwrap());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|p| p == &results[0]));
    assert_eq!(results[0].username, "alice");

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.coalesced, 15);
    assert_eq!(stats.loads, 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_share_one_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let loader: Arc<dyn Loader<Profile>> = loader_fn(move |_key: CacheKey| {
        c.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<Profile, _>(Error::load("503 from profile service"))
        }
    });
    let cache: TtlCache<Profile> = TtlCache::default();
    let key = CacheKey::profile("ghost");

    let (a, b, c) = tokio::join!(
        cache.fetch(&key, loader.clone()),
        cache.fetch(&key, loader.clone()),
        cache.fetch(&key, loader.clone()),
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let messages: Vec<String> = [a, b, c]
        .into_iter()
        .map(|r| r.unwrap_err().to_string())
        .collect();
    assert!(messages.iter().all(|m| m == &messages[0]));
    assert_eq!(messages[0], "load failed for user:ghost: 503 from profile service");

    // the failure is not cached: the next call goes upstream again
    assert!(cache.fetch(&key, loader).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_alice_scenario_ttl_five_seconds() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache: TtlCache<Profile> = TtlCache::with_ttl(Duration::from_millis(5000));
    let loader = profile_loader(calls.clone(), Duration::ZERO);
    let key = CacheKey::profile("alice");

    // t = 0: two concurrent calls, one load
    let (first, second) = tokio::join!(
        cache.fetch(&key, loader.clone()),
        cache.fetch(&key, loader.clone())
    );
    let first = first.unwrap();
    assert_eq!(first, second.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // t = 4000: still fresh
    tokio::time::advance(Duration::from_millis(4000)).await;
    assert_eq!(cache.fetch(&key, loader.clone()).await.unwrap(), first);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // t = 6000: expired, reloaded
    tokio::time::advance(Duration::from_millis(2000)).await;
    let refreshed = cache.fetch(&key, loader).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(refreshed.followers, 101);
}

#[tokio::test(start_paused = true)]
async fn test_entry_expires_exactly_at_ttl() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache: TtlCache<Profile> = TtlCache::with_ttl(Duration::from_millis(1000));
    let loader = profile_loader(calls.clone(), Duration::ZERO);
    let key = CacheKey::profile("bob");

    cache.fetch(&key, loader.clone()).await.unwrap();
    tokio::time::advance(Duration::from_millis(999)).await;
    cache.fetch(&key, loader.clone()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    cache.fetch(&key, loader).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_fetch_still_populates_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache: TtlCache<Profile> = TtlCache::default();
    let loader = profile_loader(calls.clone(), Duration::from_millis(100));
    let key = CacheKey::profile("carol");

    let gave_up = tokio::time::timeout(Duration::from_millis(10), cache.fetch(&key, loader.clone())).await;
    assert!(gave_up.is_err());
    assert_eq!(cache.get(&key).unwrap().state, EntryState::Loading);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(cache.get(&key).unwrap().state, EntryState::Ready);
    cache.fetch(&key, loader).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_keys_load_independently() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache: TtlCache<Profile> = TtlCache::default();
    let loader = profile_loader(calls.clone(), Duration::from_millis(10));

    let alice = CacheKey::profile("alice");
    let bob = CacheKey::profile("bob");
    let (a, b) = tokio::join!(
        cache.fetch(&alice, loader.clone()),
        cache.fetch(&bob, loader.clone())
    );
    assert_eq!(a.unwrap().username, "alice");
    assert_eq!(b.unwrap().username, "bob");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_waiter_stays_pending_until_flight_settles() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache: TtlCache<Profile> = TtlCache::default();
    let loader = profile_loader(calls.clone(), Duration::from_millis(50));
    let key = CacheKey::profile("dana");

    let mut waiter = tokio_test::task::spawn(cache.fetch(&key, loader));
    tokio_test::assert_pending!(waiter.poll());
    assert!(cache.is_loading(&key));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(waiter.is_woken());
    let profile = tokio_test::assert_ready_ok!(waiter.poll());
    assert_eq!(profile.username, "dana");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
