#![allow(clippy::unwrap_used)]
// Integration tests for `TtlCache` on a manual clock.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use rentdesk_cache::{
    CacheConfig, CacheError, FileStore, KvStore, ManualClock, MemoryStore, TtlCache,
};

// ── Helpers ─────────────────────────────────────────────────────────

const START: i64 = 1_700_000_000_000;

fn setup(ttl_ms: u64) -> (TtlCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let config = CacheConfig::new(Vec::new())
        .slot("owners", Duration::from_millis(ttl_ms))
        .slot("properties", Duration::from_millis(ttl_ms));
    let cache = TtlCache::with_clock(config, clock.clone());
    (cache, clock)
}

fn persistent(store: Arc<dyn KvStore>, clock: Arc<ManualClock>) -> TtlCache {
    let config = CacheConfig::new(Vec::new())
        .slot("owners", Duration::from_secs(300))
        .slot("years", Duration::from_secs(60))
        .with_persistence(true);
    TtlCache::with_parts(config, clock, store)
}

/// Fetcher that counts calls and returns `value`.
fn counted(
    calls: &Arc<AtomicUsize>,
    value: Value,
) -> impl FnOnce() -> futures::future::Ready<Result<Value, io::Error>> + Send + 'static + use<> {
    let calls = Arc::clone(calls);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(value))
    }
}

fn failing() -> futures::future::Ready<Result<Value, io::Error>> {
    futures::future::ready(Err(io::Error::other("backend down")))
}

/// Store whose deletes always fail.
struct StickyStore(MemoryStore);

impl KvStore for StickyStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.0.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.0.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        Err(CacheError::Store {
            key: key.to_owned(),
            message: "read-only".into(),
        })
    }
}

// ── Hit / miss ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_miss_hit_then_miss_after_ttl() {
    let (cache, clock) = setup(1000);
    let calls = Arc::new(AtomicUsize::new(0));

    let first = cache.get("owners", counted(&calls, json!(["ana"])), false).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_millis(500));
    let second = cache.get("owners", counted(&calls, json!(["bea"])), false).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));

    clock.advance(Duration::from_millis(1000));
    let third = cache.get("owners", counted(&calls, json!(["cid"])), false).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*third, json!(["cid"]));

    let stats = cache.stats(Some("owners"));
    let owners = stats.slot("owners").unwrap();
    assert_eq!((owners.hits, owners.misses, owners.total), (1, 2, 3));
}

#[tokio::test]
async fn test_force_refresh_always_fetches() {
    let (cache, _clock) = setup(60_000);
    let calls = Arc::new(AtomicUsize::new(0));
    cache.get("owners", counted(&calls, json!(1)), false).await.unwrap();
    let fresh = cache.get("owners", counted(&calls, json!(2)), true).await.unwrap();
    assert_eq!(*fresh, json!(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_set_empty_array_counts_as_populated() {
    let (cache, _clock) = setup(300_000);
    let calls = Arc::new(AtomicUsize::new(0));

    assert!(cache.set("owners", json!([])));
    let value = cache.get("owners", counted(&calls, json!(["x"])), false).await.unwrap();
    assert_eq!(*value, json!([]));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalidate_forces_next_get_to_fetch() {
    let (cache, _clock) = setup(300_000);
    let calls = Arc::new(AtomicUsize::new(0));

    cache.set("owners", json!(["ana"]));
    assert!(cache.is_valid("owners"));
    assert!(cache.invalidate("owners"));
    assert!(!cache.is_valid("owners"));

    cache.get("owners", counted(&calls, json!(["bea"])), false).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalidate_all_clears_every_slot() {
    let (cache, _clock) = setup(300_000);
    cache.set("owners", json!(1));
    cache.set("properties", json!(2));
    cache.invalidate_all();
    assert!(cache.peek("owners").is_none());
    assert!(cache.peek("properties").is_none());
}

#[tokio::test]
async fn test_unknown_key_fails_open() {
    let (cache, _clock) = setup(1000);
    let calls = Arc::new(AtomicUsize::new(0));

    let value = cache.get("typo", counted(&calls, json!("raw")), false).await.unwrap();
    cache.get("typo", counted(&calls, json!("raw")), false).await.unwrap();
    assert_eq!(*value, json!("raw"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!cache.set("typo", json!(1)));
    assert!(!cache.invalidate("typo"));
    assert!(cache.stats(Some("typo")).slots.is_empty());
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_serves_stale_data_when_refresh_fails() {
    let (cache, clock) = setup(1000);
    let calls = Arc::new(AtomicUsize::new(0));
    let original = cache.get("owners", counted(&calls, json!(["ana"])), false).await.unwrap();

    clock.advance(Duration::from_millis(5000));
    let stale = cache.get("owners", failing, false).await.unwrap();
    assert!(Arc::ptr_eq(&original, &stale));
    assert!(!cache.is_valid("owners"));
}

#[tokio::test]
async fn test_error_propagates_when_nothing_cached() {
    let (cache, _clock) = setup(1000);
    let err = cache.get("owners", failing, false).await.unwrap_err();

    assert!(matches!(&err, CacheError::Fetch { key, .. } if key == "owners"));
    assert_eq!(err.fetch_source().unwrap().to_string(), "backend down");
    assert_eq!(cache.stats(None).totals.misses, 1);
}

// ── Concurrency ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_misses_share_one_fetch() {
    let (cache, _clock) = setup(60_000);
    let calls = Arc::new(AtomicUsize::new(0));

    let slow = |calls: &Arc<AtomicUsize>| {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::task::yield_now().await;
                Ok::<_, io::Error>(json!(["shared"]))
            }
        }
    };

    let (a, b) = tokio::join!(
        cache.get("owners", slow(&calls), false),
        cache.get("owners", slow(&calls), false),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.stats(Some("owners")).totals.misses, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_closure_may_read_the_cache() {
    let (cache, _clock) = setup(60_000);
    let reader = cache.clone();
    let fetch = move || {
        assert!(reader.peek("owners").is_none());
        assert!(!reader.is_valid("owners"));
        let misses = reader.stats(Some("owners")).totals.misses;
        async move { Ok::<_, io::Error>(json!({ "misses": misses })) }
    };

    let task = tokio::spawn(async move { cache.get("owners", fetch, false).await });
    let value = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("get did not return")
        .unwrap()
        .unwrap();
    assert_eq!(*value, json!({ "misses": 1 }));
}

#[tokio::test]
async fn test_set_during_fetch_wins_over_older_result() {
    let (cache, _clock) = setup(60_000);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let fetch = move || async move {
        rx.await.map_err(io::Error::other)?;
        Ok::<_, io::Error>(json!("from-server"))
    };
    let writer = async {
        tokio::task::yield_now().await;
        cache.set("owners", json!("from-mutation"));
        tx.send(()).unwrap();
    };

    let (fetched, ()) = tokio::join!(cache.get("owners", fetch, false), writer);
    assert_eq!(*fetched.unwrap(), json!("from-server"));
    assert_eq!(*cache.peek("owners").unwrap(), json!("from-mutation"));
}

#[tokio::test]
async fn test_invalidate_during_fetch_discards_result() {
    let (cache, _clock) = setup(60_000);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let fetch = move || async move {
        rx.await.map_err(io::Error::other)?;
        Ok::<_, io::Error>(json!("late"))
    };
    let invalidator = async {
        tokio::task::yield_now().await;
        cache.invalidate("owners");
        tx.send(()).unwrap();
    };

    let (fetched, ()) = tokio::join!(cache.get("owners", fetch, false), invalidator);
    assert_eq!(*fetched.unwrap(), json!("late"));
    assert!(cache.peek("owners").is_none());
}

// ── Listeners and subscriptions ─────────────────────────────────────

#[tokio::test]
async fn test_write_from_listener_supersedes_older_notification() {
    let store = Arc::new(MemoryStore::new());
    let cache = persistent(store.clone(), Arc::new(ManualClock::new(START)));
    let writer = cache.clone();
    cache
        .add_listener("owners", move |v| {
            if **v == json!("from-server") {
                writer.set("owners", json!("from-mutation"));
            }
        })
        .unwrap();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    cache
        .add_listener("owners", move |v| sink.lock().unwrap().push((**v).clone()))
        .unwrap();

    cache
        .get("owners", || async { Ok::<_, io::Error>(json!("from-server")) }, false)
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!("from-mutation")]);
    let stored: Value = serde_json::from_str(&store.get("cache_owners").unwrap().unwrap()).unwrap();
    assert_eq!(stored["data"], json!("from-mutation"));
    assert_eq!(*cache.peek("owners").unwrap(), json!("from-mutation"));
}

#[tokio::test]
async fn test_listeners_fire_on_refresh_and_set_but_not_invalidate() {
    let (cache, _clock) = setup(60_000);
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

    cache.add_listener("owners", |_| panic!("bad subscriber")).unwrap();
    let sink = Arc::clone(&seen);
    let id = cache
        .add_listener("owners", move |v| sink.lock().unwrap().push((**v).clone()))
        .unwrap();

    cache.get("owners", || async { Ok::<_, io::Error>(json!(1)) }, false).await.unwrap();
    cache.set("owners", json!(2));
    cache.invalidate("owners");
    assert_eq!(*seen.lock().unwrap(), vec![json!(1), json!(2)]);

    assert!(cache.remove_listener("owners", id));
    assert!(!cache.remove_listener("owners", id));
    cache.set("owners", json!(3));
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert!(cache.add_listener("nope", |_| {}).is_none());
}

#[tokio::test]
async fn test_subscription_sees_updates() {
    let (cache, _clock) = setup(60_000);
    let mut sub = cache.subscribe("owners").unwrap();
    assert!(sub.current().is_none());

    cache.set("owners", json!(["ana"]));
    let next = sub.changed().await.unwrap();
    assert_eq!(*next, json!(["ana"]));
    assert_eq!(sub.latest().as_deref(), Some(&json!(["ana"])));

    let mut stream = cache.subscribe("owners").unwrap().into_stream();
    let first = stream.next().await.unwrap();
    assert_eq!(first.as_deref(), Some(&json!(["ana"])));
}

// ── Statistics ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_stats_totals_and_reset() {
    let (cache, clock) = setup(60_000);
    cache.get("owners", || async { Ok::<_, io::Error>(json!(1)) }, false).await.unwrap();
    cache.get("owners", || async { Ok::<_, io::Error>(json!(1)) }, false).await.unwrap();
    cache.get("owners", || async { Ok::<_, io::Error>(json!(1)) }, false).await.unwrap();
    clock.advance(Duration::from_millis(250));

    let stats = cache.stats(None);
    assert_eq!(stats.slots.len(), 2);
    assert_eq!((stats.totals.hits, stats.totals.misses), (2, 1));
    assert_eq!(rentdesk_cache::format_rate(stats.totals.hit_rate), "66.67%");
    let owners = stats.slot("owners").unwrap();
    assert!(owners.has_data && owners.is_valid);
    assert_eq!(owners.age_ms, 250);
    assert_eq!(stats.slot("properties").unwrap().age_ms, 0);

    cache.reset_stats();
    assert_eq!(cache.stats(None).totals.total, 0);
    assert!(cache.is_valid("owners"));
}

// ── Sweeping ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sweep_clears_only_expired_slots() {
    let (cache, clock) = setup(1000);
    cache.set("owners", json!(1));
    clock.advance(Duration::from_millis(600));
    cache.set("properties", json!(2));
    clock.advance(Duration::from_millis(600));

    assert_eq!(cache.sweep_expired(), 1);
    assert!(cache.peek("owners").is_none());
    assert!(cache.peek("properties").is_some());
    assert_eq!(cache.sweep_expired(), 0);
}

#[tokio::test]
async fn test_exact_ttl_boundary_counts_as_expired() {
    let (cache, clock) = setup(1000);
    cache.set("owners", json!(1));

    clock.advance(Duration::from_millis(999));
    assert!(cache.is_valid("owners"));
    assert_eq!(cache.sweep_expired(), 0);

    clock.advance(Duration::from_millis(1));
    assert!(!cache.is_valid("owners"));
    assert!(!cache.stats(Some("owners")).slot("owners").unwrap().is_valid);
    assert_eq!(cache.sweep_expired(), 1);
    assert!(cache.peek("owners").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_background_sweeper_runs_until_cancelled() {
    let clock = Arc::new(ManualClock::new(START));
    let config = CacheConfig::new(Vec::new())
        .slot("owners", Duration::from_millis(100))
        .with_sweep_interval(Duration::from_secs(1));
    let cache: TtlCache = TtlCache::with_clock(config, clock.clone());

    cache.set("owners", json!(1));
    clock.advance(Duration::from_millis(200));

    let cancel = CancellationToken::new();
    let handle = cache.spawn_sweeper(cancel.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(cache.peek("owners").is_none());

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_zero_sweep_interval_spawns_nothing() {
    let config = CacheConfig::new(Vec::new()).with_sweep_interval(Duration::ZERO);
    let cache: TtlCache = TtlCache::new(config);
    assert!(cache.spawn_sweeper(CancellationToken::new()).is_none());
}

// ── Persistence ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_persisted_slots_reload_and_expired_ones_are_pruned() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));

    let cache = persistent(store.clone(), clock.clone());
    cache.set("owners", json!([1, 2]));
    cache.set("years", json!([2024]));
    assert_eq!(
        store.get("cache_owners").unwrap().as_deref(),
        Some(format!(r#"{{"data":[1,2],"timestamp":{START}}}"#).as_str())
    );

    clock.advance(Duration::from_secs(120));
    let reloaded = persistent(store.clone(), clock.clone());
    assert_eq!(*reloaded.peek("owners").unwrap(), json!([1, 2]));
    assert!(reloaded.peek("years").is_none());
    assert!(store.get("cache_years").unwrap().is_none());

    reloaded.invalidate("owners");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(START));

    let store: Arc<dyn KvStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let cache = persistent(Arc::clone(&store), clock.clone());
    cache
        .get("owners", || async { Ok::<_, io::Error>(json!({"total": 3})) }, false)
        .await
        .unwrap();
    drop(cache);

    let store: Arc<dyn KvStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let calls = Arc::new(AtomicUsize::new(0));
    let restarted = persistent(store, clock);
    let value = restarted.get("owners", counted(&calls, json!(null)), false).await.unwrap();
    assert_eq!(*value, json!({"total": 3}));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_corrupt_persisted_entry_is_discarded() {
    let store = Arc::new(MemoryStore::new());
    store.set("cache_owners", "not json").unwrap();
    let cache = persistent(store.clone(), Arc::new(ManualClock::new(START)));
    assert!(cache.peek("owners").is_none());
    assert!(store.get("cache_owners").unwrap().is_none());
}

#[tokio::test]
async fn test_failed_prune_still_starts_empty() {
    let inner = MemoryStore::new();
    inner.set("cache_owners", "not json").unwrap();
    inner
        .set("cache_years", &format!(r#"{{"data":[2024],"timestamp":{}}}"#, START - 120_000))
        .unwrap();
    let store = Arc::new(StickyStore(inner));

    let cache = persistent(store.clone(), Arc::new(ManualClock::new(START)));
    assert!(cache.peek("owners").is_none());
    assert!(cache.peek("years").is_none());
    assert!(!cache.is_valid("years"));
    assert!(store.get("cache_years").unwrap().is_some());
}
