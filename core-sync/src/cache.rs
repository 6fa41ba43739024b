//! # Value Cache
//!
//! A TTL-bounded LRU cache of entry values keyed by `(store, name)`, with
//! in-flight request coalescing.
//!
//! ## Overview
//!
//! - Fresh values are served without touching the store.
//! - Concurrent misses for the same key share one fetch (`futures::future::Shared`).
//! - The fetch future itself clears its in-flight slot and writes a successful
//!   result into the cache, so a value is written exactly once per fetch.
//! - A direct write or invalidation supersedes any fetch in flight for that key;
//!   the superseded fetch still answers its callers but never touches the cache.
//! - Failures are never cached; the next request retries.
//! - Stale entries are treated as absent and evicted lazily on lookup.
//!
//! The cache is an explicit handle (`Arc<ValueCache>`) passed to whoever needs
//! it; there is no process-wide instance.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::cache::{CacheKey, ValueCache};
//!
//! let cache = Arc::new(ValueCache::new(Duration::from_secs(300), 25_000, clock));
//! let key = CacheKey::new(&store, "db-password");
//! let value = cache
//!     .get_or_fetch(key, || async move { Ok(Some("s3cret".to_string())) })
//!     .await?;
//! ```

use crate::error::FetchError;
use bridge_traits::{Clock, StoreRef};
use chrono::{DateTime, Utc};
use core_runtime::CacheSettings;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Result of loading one value. `Ok(None)` means the entry exists but has no value.
pub type FetchResult = std::result::Result<Option<String>, FetchError>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

/// Identity of a cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub store: StoreRef,
    pub name: String,
}

impl CacheKey {
    pub fn new(store: &StoreRef, name: impl Into<String>) -> Self {
        Self {
            store: store.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store.display_name(), self.name)
    }
}

#[derive(Debug, Clone)]
struct CachedValue {
    value: Option<String>,
    fetched_at: DateTime<Utc>,
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Values currently held (including not-yet-evicted stale ones)
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Requests that joined a fetch already in flight
    pub coalesced: u64,
}

pub struct ValueCache {
    entries: Arc<Mutex<LruCache<CacheKey, CachedValue>>>,
    in_flight: Arc<Mutex<HashMap<CacheKey, InFlight>>>,
    generations: AtomicU64,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

impl ValueCache {
    /// Create a cache. A zero capacity is raised to one.
    pub fn new(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: &CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Duration::from_secs(settings.ttl_secs),
            settings.capacity,
            clock,
        )
    }

    /// Fresh value for `key`, or `None` when absent or stale.
    pub async fn get(&self, key: &CacheKey) -> Option<Option<String>> {
        let found = self.lookup(key).await;
        self.record(found.is_some());
        found
    }

    /// Return a fresh cached value, join an in-flight fetch for the same key,
    /// or start `fetch` and share it with later callers.
    ///
    /// `fetch` is only invoked when this call starts a new fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        if let Some(value) = self.lookup(&key).await {
            self.record(true);
            return Ok(value);
        }

        let shared = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.get(&key) {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "Joining in-flight fetch");
                existing.fetch.clone()
            } else {
                // A fetch may have completed between the first lookup and taking the lock
                if let Some(value) = self.lookup(&key).await {
                    self.record(true);
                    return Ok(value);
                }
                self.record(false);

                let generation = self.generations.fetch_add(1, Ordering::Relaxed);
                let shared = self.share_fetch(key.clone(), generation, fetch());
                in_flight.insert(
                    key,
                    InFlight {
                        generation,
                        fetch: shared.clone(),
                    },
                );
                shared
            }
        };

        shared.await
    }

    fn share_fetch<Fut>(&self, key: CacheKey, generation: u64, fetch: Fut) -> SharedFetch
    where
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let in_flight = Arc::clone(&self.in_flight);
        let clock = Arc::clone(&self.clock);

        async move {
            let result = fetch.await;

            // Lock order matches get_or_fetch: in_flight, then entries
            let mut in_flight = in_flight.lock().await;
            let current = in_flight
                .get(&key)
                .is_some_and(|slot| slot.generation == generation);
            if !current {
                debug!(key = %key, "Fetch superseded by a write, result not cached");
                return result;
            }
            in_flight.remove(&key);
            if let Ok(value) = &result {
                entries.lock().await.put(
                    key.clone(),
                    CachedValue {
                        value: value.clone(),
                        fetched_at: clock.now(),
                    },
                );
            }
            debug!(key = %key, ok = result.is_ok(), "Fetch settled");
            result
        }
        .boxed()
        .shared()
    }

    /// Write a value directly, e.g. after a successful create or update.
    ///
    /// Any fetch in flight for `key` is superseded and will not overwrite this value.
    pub async fn insert(&self, key: CacheKey, value: Option<String>) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.remove(&key).is_some() {
            debug!(key = %key, "Write superseded in-flight fetch");
        }
        let fetched_at = self.clock.now();
        self.entries
            .lock()
            .await
            .put(key, CachedValue { value, fetched_at });
    }

    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let mut in_flight = self.in_flight.lock().await;
        in_flight.remove(key);
        self.entries.lock().await.pop(key).is_some()
    }

    /// Drop every value belonging to `store`. Returns how many were removed.
    pub async fn invalidate_store(&self, store: &StoreRef) -> usize {
        let mut in_flight = self.in_flight.lock().await;
        in_flight.retain(|key, _| &key.store != store);
        let mut entries = self.entries.lock().await;
        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, _)| &key.store == store)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub async fn clear(&self) {
        let mut in_flight = self.in_flight.lock().await;
        in_flight.clear();
        self.entries.lock().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Option<String>> {
        let mut entries = self.entries.lock().await;
        let cached = entries.get(key)?;
        if self.clock.now() - cached.fetched_at >= self.ttl {
            entries.pop(key);
            trace!(key = %key, "Evicted stale value");
            return None;
        }
        Some(cached.value.clone())
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for ValueCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCache")
            .field("ttl", &self.ttl)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
