// ── TTL cache ──
//
// Slots live in a `DashMap`. No map guard is ever held across an `.await`,
// while listeners run or while a caller's fetch closure runs. Each slot carries a generation counter: starting a
// fetch, `set` and `invalidate` all bump it, and a fetch only stores its
// result if it is still the slot's current in-flight request.

use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, FetchError};
use crate::stats::{CacheStats, SlotStats};
use crate::store::{KvStore, MemoryStore, StoredEntry};
use crate::stream::{Snapshot, SlotStream};

type FetchOutput<T> = Result<Arc<T>, FetchError>;
type InFlight<T> = Shared<BoxFuture<'static, FetchOutput<T>>>;

/// Callback run with a slot's new value after a refresh or `set`.
pub type Listener<T> = Arc<dyn Fn(&Arc<T>) + Send + Sync>;

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The slot's current fetch, shared by every caller that joins it.
struct Pending<T: Send + Sync + 'static> {
    generation: u64,
    started_at: i64,
    fut: InFlight<T>,
}

impl<T: Send + Sync + 'static> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            started_at: self.started_at,
            fut: self.fut.clone(),
        }
    }
}

struct Slot<T: Send + Sync + 'static> {
    ttl_ms: i64,
    data: Option<Arc<T>>,
    fetched_at: i64,
    hits: u64,
    misses: u64,
    generation: u64,
    in_flight: Option<Pending<T>>,
    listeners: Vec<(ListenerId, Listener<T>)>,
    tx: watch::Sender<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> Slot<T> {
    fn new(ttl: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            data: None,
            fetched_at: 0,
            hits: 0,
            misses: 0,
            generation: 0,
            in_flight: None,
            listeners: Vec::new(),
            tx,
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        now.saturating_sub(self.fetched_at) > self.ttl_ms
    }

    /// Strictly inside the TTL. `get` still serves the value at the exact
    /// boundary; validity and sweeps treat it as expired.
    fn is_fresh(&self, now: i64) -> bool {
        now.saturating_sub(self.fetched_at) < self.ttl_ms
    }

    fn is_valid(&self, now: i64) -> bool {
        self.data.is_some() && self.is_fresh(now)
    }

    fn clear(&mut self) {
        self.data = None;
        self.fetched_at = 0;
        self.generation += 1;
        self.in_flight = None;
    }

    fn stats(&self, key: &str, now: i64) -> SlotStats {
        let total = self.hits + self.misses;
        SlotStats {
            key: key.to_owned(),
            hits: self.hits,
            misses: self.misses,
            total,
            hit_rate: crate::stats::hit_rate(self.hits, total),
            has_data: self.data.is_some(),
            age_ms: if self.fetched_at > 0 {
                now.saturating_sub(self.fetched_at)
            } else {
                0
            },
            is_valid: self.is_valid(now),
        }
    }
}

struct Inner<T: Send + Sync + 'static> {
    config: CacheConfig,
    /// Slot keys in declaration order.
    order: Vec<String>,
    slots: DashMap<String, Slot<T>>,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn KvStore>>,
    next_listener: AtomicU64,
}

/// Keyed cache of independently expiring slots.
///
/// Cloning is cheap and every clone shares the same slots.
pub struct TtlCache<T: Send + Sync + 'static = serde_json::Value> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + Sync + 'static> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for TtlCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("slots", &self.inner.order)
            .field("persistence", &self.inner.store.is_some())
            .finish_non_exhaustive()
    }
}

enum Plan<T: Send + Sync + 'static, F> {
    Hit(Arc<T>),
    Fetch(Pending<T>),
    Bypass(F),
}

impl<T> TtlCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// In-memory cache on the system clock. Persistence, if enabled in
    /// `config`, goes to a process-local `MemoryStore`.
    pub fn new(config: CacheConfig) -> Self {
        let store: Option<Arc<dyn KvStore>> = if config.persistence {
            Some(Arc::new(MemoryStore::new()))
        } else {
            None
        };
        Self::build(config, Arc::new(SystemClock), store)
    }

    /// Cache with an explicit clock and persistence store. The store is only
    /// used when `config.persistence` is set.
    pub fn with_parts(config: CacheConfig, clock: Arc<dyn Clock>, store: Arc<dyn KvStore>) -> Self {
        let store = config.persistence.then_some(store);
        Self::build(config, clock, store)
    }

    /// Cache on a custom clock without persistence.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let mut config = config;
        config.persistence = false;
        Self::build(config, clock, None)
    }

    fn build(config: CacheConfig, clock: Arc<dyn Clock>, store: Option<Arc<dyn KvStore>>) -> Self {
        let slots = DashMap::new();
        let mut order = Vec::with_capacity(config.slots.len());
        for slot in &config.slots {
            if slots.contains_key(&slot.key) {
                warn!(key = %slot.key, "duplicate cache slot ignored");
                continue;
            }
            slots.insert(slot.key.clone(), Slot::new(slot.ttl));
            order.push(slot.key.clone());
        }

        let cache = Self {
            inner: Arc::new(Inner {
                config,
                order,
                slots,
                clock,
                store,
                next_listener: AtomicU64::new(1),
            }),
        };
        if cache.inner.store.is_some() {
            cache.load_persisted();
        }
        debug!(slots = cache.inner.order.len(), "cache initialized");
        cache
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Declared slot keys in declaration order.
    pub fn keys(&self) -> &[String] {
        &self.inner.order
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.slots.contains_key(key)
    }

    fn now(&self) -> i64 {
        self.inner.clock.now_millis()
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Return the slot's value, calling `fetch` on a miss.
    ///
    /// A miss is a forced refresh, an empty slot, or an expired one.
    /// Concurrent non-forced misses on one slot share a single fetch. When a
    /// fetch fails and the slot still holds an older value, that value is
    /// returned instead of the error. Unknown keys bypass the cache and call
    /// `fetch` directly.
    ///
    /// `fetch` runs when the shared future is first polled, after the slot
    /// lock is released, so it may read this cache.
    pub async fn get<F, Fut, E>(&self, key: &str, fetch: F, force_refresh: bool) -> Result<Arc<T>, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let started_at = self.now();
        let plan = match self.inner.slots.get_mut(key) {
            None => Plan::Bypass(fetch),
            Some(mut slot) => {
                let fresh = !force_refresh && !slot.is_expired(started_at);
                let cached = slot.data.clone().filter(|_| fresh);
                if let Some(data) = cached {
                    slot.hits += 1;
                    Plan::Hit(data)
                } else {
                    slot.misses += 1;
                    let joinable = if force_refresh {
                        None
                    } else {
                        slot.in_flight.clone()
                    };
                    if let Some(pending) = joinable {
                        trace!(key, generation = pending.generation, "joining in-flight fetch");
                        Plan::Fetch(pending)
                    } else {
                        slot.generation += 1;
                        let generation = slot.generation;
                        let fut = async move { fetch().await }
                            .map(|r| r.map(Arc::new).map_err(|e| Arc::new(e) as FetchError))
                            .boxed()
                            .shared();
                        let pending = Pending {
                            generation,
                            started_at,
                            fut,
                        };
                        slot.in_flight = Some(pending.clone());
                        debug!(key, generation, force_refresh, "cache miss, fetching");
                        Plan::Fetch(pending)
                    }
                }
            }
        };

        let pending = match plan {
            Plan::Hit(data) => {
                trace!(key, "cache hit");
                return Ok(data);
            }
            Plan::Fetch(pending) => pending,
            Plan::Bypass(fetch) => {
                debug!(key, "unknown cache key, fetching uncached");
                return fetch().await.map(Arc::new).map_err(|e| CacheError::Fetch {
                    key: key.to_owned(),
                    source: Arc::new(e),
                });
            }
        };

        let generation = pending.generation;
        match pending.fut.await {
            Ok(data) => {
                if let Some(listeners) = self.store_fetched(key, generation, &data, pending.started_at) {
                    self.publish(key, &data, &listeners, generation);
                }
                Ok(data)
            }
            Err(source) => {
                let stale = self.inner.slots.get_mut(key).and_then(|mut slot| {
                    if slot.in_flight.as_ref().is_some_and(|p| p.generation == generation) {
                        slot.in_flight = None;
                    }
                    slot.data.clone()
                });
                match stale {
                    Some(data) => {
                        warn!(key, error = %source, "fetch failed, serving stale data");
                        Ok(data)
                    }
                    None => {
                        warn!(key, error = %source, "fetch failed with nothing cached");
                        Err(CacheError::Fetch {
                            key: key.to_owned(),
                            source,
                        })
                    }
                }
            }
        }
    }

    /// Store and persist a fetch result if it is still the slot's current
    /// request. Returns the listeners to notify when it was stored.
    fn store_fetched(
        &self,
        key: &str,
        generation: u64,
        data: &Arc<T>,
        fetched_at: i64,
    ) -> Option<Vec<Listener<T>>> {
        let mut slot = self.inner.slots.get_mut(key)?;
        let current = slot.generation == generation
            && slot.in_flight.as_ref().is_some_and(|p| p.generation == generation);
        if !current {
            trace!(key, generation, latest = slot.generation, "discarding superseded fetch");
            return None;
        }
        slot.in_flight = None;
        slot.data = Some(Arc::clone(data));
        slot.fetched_at = fetched_at;
        slot.tx.send_replace(Some(Arc::clone(data)));
        self.persist(key, data, fetched_at);
        Some(slot.listeners.iter().map(|(_, l)| Arc::clone(l)).collect())
    }

    /// Valid means populated and not yet expired.
    pub fn is_valid(&self, key: &str) -> bool {
        let now = self.now();
        self.inner
            .slots
            .get(key)
            .is_some_and(|slot| slot.is_valid(now))
    }

    /// Current value without touching statistics or expiry.
    pub fn peek(&self, key: &str) -> Option<Arc<T>> {
        self.inner.slots.get(key).and_then(|slot| slot.data.clone())
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Overwrite a slot with `data` as of now, superseding any in-flight
    /// fetch. Returns `false` for an unknown key.
    pub fn set(&self, key: &str, data: T) -> bool {
        let now = self.now();
        let data = Arc::new(data);
        let (generation, listeners) = {
            let Some(mut slot) = self.inner.slots.get_mut(key) else {
                debug!(key, "set on unknown cache key ignored");
                return false;
            };
            slot.generation += 1;
            slot.in_flight = None;
            slot.data = Some(Arc::clone(&data));
            slot.fetched_at = now;
            slot.tx.send_replace(Some(Arc::clone(&data)));
            self.persist(key, &data, now);
            let listeners = slot
                .listeners
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect::<Vec<_>>();
            (slot.generation, listeners)
        };
        debug!(key, "cache primed");
        self.publish(key, &data, &listeners, generation);
        true
    }

    /// Empty one slot so the next `get` misses. Listeners are not notified.
    pub fn invalidate(&self, key: &str) -> bool {
        let Some(mut slot) = self.inner.slots.get_mut(key) else {
            debug!(key, "invalidate on unknown cache key ignored");
            return false;
        };
        slot.clear();
        drop(slot);
        self.unpersist(key);
        debug!(key, "cache invalidated");
        true
    }

    pub fn invalidate_all(&self) {
        for key in &self.inner.order {
            if let Some(mut slot) = self.inner.slots.get_mut(key) {
                slot.clear();
            }
            self.unpersist(key);
        }
        info!(slots = self.inner.order.len(), "all cache slots invalidated");
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register a callback for a slot's refreshes and `set`s. Returns `None`
    /// for an unknown key.
    pub fn add_listener(
        &self,
        key: &str,
        callback: impl Fn(&Arc<T>) + Send + Sync + 'static,
    ) -> Option<ListenerId> {
        let mut slot = self.inner.slots.get_mut(key)?;
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        slot.listeners.push((id, Arc::new(callback)));
        Some(id)
    }

    pub fn remove_listener(&self, key: &str, id: ListenerId) -> bool {
        let Some(mut slot) = self.inner.slots.get_mut(key) else {
            return false;
        };
        let before = slot.listeners.len();
        slot.listeners.retain(|(lid, _)| *lid != id);
        slot.listeners.len() != before
    }

    /// Watch a slot's value. Fires on the same events as listeners.
    pub fn subscribe(&self, key: &str) -> Option<SlotStream<T>> {
        self.inner
            .slots
            .get(key)
            .map(|slot| SlotStream::new(slot.tx.subscribe()))
    }

    /// Notify listeners of `data` until a newer write supersedes it.
    fn publish(&self, key: &str, data: &Arc<T>, listeners: &[Listener<T>], generation: u64) {
        for (index, listener) in listeners.iter().enumerate() {
            let current = self
                .inner
                .slots
                .get(key)
                .is_some_and(|slot| slot.generation == generation);
            if !current {
                trace!(key, generation, "superseded value, remaining listeners skipped");
                break;
            }
            if catch_unwind(AssertUnwindSafe(|| listener(data))).is_err() {
                warn!(key, listener = index, "cache listener panicked");
            }
        }
    }

    // ── Statistics ───────────────────────────────────────────────────

    /// Statistics for one slot, or for every slot when `key` is `None`.
    /// An unknown key yields no slots and zero totals.
    pub fn stats(&self, key: Option<&str>) -> CacheStats {
        let now = self.now();
        let slots = self
            .inner
            .order
            .iter()
            .filter(|k| key.is_none_or(|wanted| wanted == k.as_str()))
            .filter_map(|k| self.inner.slots.get(k).map(|slot| slot.stats(k, now)))
            .collect();
        CacheStats::from_slots(slots)
    }

    pub fn reset_stats(&self) {
        for mut slot in self.inner.slots.iter_mut() {
            slot.hits = 0;
            slot.misses = 0;
        }
        debug!("cache statistics reset");
    }

    // ── Expiry sweep ─────────────────────────────────────────────────

    /// Invalidate every populated slot whose TTL has passed. Returns how many
    /// slots were cleared.
    pub fn sweep_expired(&self) -> usize {
        let now = self.now();
        let expired: Vec<String> = self
            .inner
            .order
            .iter()
            .filter(|k| {
                self.inner
                    .slots
                    .get(k.as_str())
                    .is_some_and(|slot| {
                        slot.data.is_some() && !slot.is_fresh(now) && slot.in_flight.is_none()
                    })
            })
            .cloned()
            .collect();
        for key in &expired {
            self.invalidate(key);
        }
        if !expired.is_empty() {
            debug!(cleaned = expired.len(), "expired cache slots swept");
        }
        expired.len()
    }

    /// Run `sweep_expired` every `sweep_interval` until `cancel` fires.
    /// Returns `None` when the interval is zero. Must be called inside a
    /// Tokio runtime.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let period = self.inner.config.sweep_interval;
        if period.is_zero() {
            return None;
        }
        let cache = self.clone();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        cache.sweep_expired();
                    }
                }
            }
            trace!("cache sweeper stopped");
        }))
    }

    // ── Persistence ──────────────────────────────────────────────────

    fn load_persisted(&self) {
        let Some(store) = &self.inner.store else {
            return;
        };
        let now = self.now();
        let mut restored = 0usize;
        for key in &self.inner.order {
            let storage_key = self.inner.config.storage_key(key);
            let raw = match store.get(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key, error = %e, "failed to read persisted cache slot");
                    continue;
                }
            };
            let entry: StoredEntry<T> = match serde_json::from_str(&raw) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(key, error = %e, "discarding unreadable persisted cache slot");
                    if let Err(e) = store.remove(&storage_key) {
                        warn!(key, error = %e, "failed to remove persisted cache slot");
                    }
                    continue;
                }
            };
            let Some(mut slot) = self.inner.slots.get_mut(key) else {
                continue;
            };
            slot.fetched_at = entry.timestamp;
            if slot.is_fresh(now) {
                let data = Arc::new(entry.data);
                slot.data = Some(Arc::clone(&data));
                slot.tx.send_replace(Some(data));
                restored += 1;
            } else {
                slot.fetched_at = 0;
                drop(slot);
                trace!(key, "pruning expired persisted cache slot");
                if let Err(e) = store.remove(&storage_key) {
                    warn!(key, error = %e, "failed to remove expired persisted cache slot");
                }
            }
        }
        if restored > 0 {
            info!(restored, "cache slots restored from storage");
        }
    }

    fn persist(&self, key: &str, data: &Arc<T>, timestamp: i64) {
        let Some(store) = &self.inner.store else {
            return;
        };
        let entry = StoredEntry {
            data: data.as_ref(),
            timestamp,
        };
        let result = serde_json::to_string(&entry)
            .map_err(|e| CacheError::Store {
                key: key.to_owned(),
                message: e.to_string(),
            })
            .and_then(|json| store.set(&self.inner.config.storage_key(key), &json));
        if let Err(e) = result {
            warn!(key, error = %e, "failed to persist cache slot");
        }
    }

    fn unpersist(&self, key: &str) {
        if let Some(store) = &self.inner.store {
            if let Err(e) = store.remove(&self.inner.config.storage_key(key)) {
                warn!(key, error = %e, "failed to remove persisted cache slot");
            }
        }
    }
}
