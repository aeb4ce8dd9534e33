//! Background-refresh cache with request coalescing.
//!
//! Read policy per key:
//!
//! - no entry: the caller waits for a fetch; concurrent callers for the same
//!   key share that one fetch
//! - entry inside its staleness window: returned immediately
//! - entry past its window or invalidated: returned immediately, and exactly
//!   one background refresh is started if none is running
//!
//! Fetches run on their own tokio task, so a caller that stops waiting does
//! not cancel work other callers depend on. A failed background refresh keeps
//! the previous value; a failed first fetch is returned to every waiter.

use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, CacheRead, EntryState, ReadOrigin};
use super::stats::{CacheStats, StatsCounters};
use chrono::{DateTime, Utc};
use classi_core::{CacheError, ClassiResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Value plus the instant it was stored.
type FetchOutput<T> = (Arc<T>, DateTime<Utc>);

type SharedFetch<T> = Shared<BoxFuture<'static, ClassiResult<FetchOutput<T>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    /// No value existed; callers are waiting on it.
    Initial,
    /// A stale value is being served meanwhile.
    Background,
}

struct InFlight<T> {
    /// Identifies this fetch so a cleared-then-refetched key is not
    /// overwritten by an older fetch finishing late.
    epoch: u64,
    fetch: SharedFetch<T>,
}

struct Slot<T> {
    entry: Option<CacheEntry<T>>,
    in_flight: Option<InFlight<T>>,
    /// Invalidated while a fetch was running; that fetch's result is
    /// installed stale.
    invalidated: bool,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            entry: None,
            in_flight: None,
            invalidated: false,
        }
    }

    /// Mark the slot stale. Returns whether there was anything to mark.
    fn invalidate(&mut self) -> bool {
        if self.in_flight.is_some() {
            self.invalidated = true;
        }
        match self.entry.as_mut() {
            Some(entry) => {
                entry.mark_stale();
                true
            }
            None => self.in_flight.is_some(),
        }
    }
}

/// Outcome of the locked decision step of a read.
enum Plan<T> {
    Ready(CacheRead<T>),
    Wait(SharedFetch<T>),
}

struct Inner<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
    clock: Arc<dyn Clock>,
    stats: StatsCounters,
    next_epoch: AtomicU64,
}

impl<T> Inner<T> {
    fn lock(&self) -> ClassiResult<MutexGuard<'_, HashMap<String, Slot<T>>>> {
        self.slots
            .lock()
            .map_err(|_| CacheError::LockPoisoned.into())
    }

    /// Install (or discard) the result of fetch `epoch` for `key`.
    fn complete(
        &self,
        key: &str,
        epoch: u64,
        kind: FetchKind,
        result: ClassiResult<T>,
    ) -> ClassiResult<FetchOutput<T>> {
        let now = self.clock.now();
        let mut slots = self.lock()?;
        let slot = slots
            .get_mut(key)
            .filter(|slot| slot.in_flight.as_ref().map(|f| f.epoch) == Some(epoch));

        match result {
            Ok(value) => {
                let value = Arc::new(value);
                match slot {
                    Some(slot) => {
                        let mut entry = CacheEntry::fresh(Arc::clone(&value), now);
                        if slot.invalidated {
                            entry.mark_stale();
                        }
                        slot.entry = Some(entry);
                        slot.in_flight = None;
                        slot.invalidated = false;
                        debug!(key, ?kind, "cache entry installed");
                    }
                    None => debug!(key, "key cleared during fetch; result not installed"),
                }
                Ok((value, now))
            }
            Err(err) => {
                let remove = match slot {
                    Some(slot) => {
                        slot.in_flight = None;
                        slot.invalidated = false;
                        slot.entry.is_none()
                    }
                    None => false,
                };
                if remove {
                    slots.remove(key);
                }
                drop(slots);

                match kind {
                    FetchKind::Background => {
                        self.stats.refresh_failed();
                        warn!(key, error = %err, "background refresh failed; keeping stale value");
                    }
                    FetchKind::Initial => debug!(key, error = %err, "initial fetch failed"),
                }
                Err(err)
            }
        }
    }
}

/// Stale-while-revalidate cache keyed by string.
///
/// Cloning is cheap; clones share the same entries.
///
/// # Example
///
/// ```ignore
/// let cache: RefreshCache<Vec<Listing>> = RefreshCache::new();
/// let featured = cache.wrap("featured:home", Duration::from_secs(60), || async {
///     load_featured().await
/// });
/// let listings = featured.get().await?;
/// ```
pub struct RefreshCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for RefreshCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Default for RefreshCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> RefreshCache<T> {
    /// Create a cache on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a cache on an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                clock,
                stats: StatsCounters::default(),
                next_epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Read `key`, fetching or refreshing it as needed.
    ///
    /// `fetch` is called at most once, and only when this read has to start
    /// a fetch. It is called while the key's slot is locked, so it should
    /// only build the future; the work belongs inside the future.
    pub async fn read<F, Fut>(
        &self,
        key: &str,
        stale_time: Duration,
        fetch: F,
    ) -> ClassiResult<CacheRead<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClassiResult<T>> + Send + 'static,
    {
        let pending = match self.plan(key, stale_time, fetch)? {
            Plan::Ready(read) => return Ok(read),
            Plan::Wait(pending) => pending,
        };

        let (value, stored_at) = pending.await?;
        Ok(CacheRead::new(value, stored_at, ReadOrigin::Fetched))
    }

    /// Read `key` and return only the value.
    pub async fn get<F, Fut>(&self, key: &str, stale_time: Duration, fetch: F) -> ClassiResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClassiResult<T>> + Send + 'static,
    {
        self.read(key, stale_time, fetch)
            .await
            .map(CacheRead::into_value)
    }

    /// Bind a key, window and fetch function into a cache-aware replacement
    /// for calling `fetch` directly.
    pub fn wrap<F, Fut>(
        &self,
        key: impl Into<String>,
        stale_time: Duration,
        fetch: F,
    ) -> CachedFetch<T, F>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ClassiResult<T>> + Send + 'static,
    {
        CachedFetch {
            cache: self.clone(),
            key: key.into(),
            stale_time,
            fetch,
        }
    }

    /// The locked check-decide-start step. Never awaits.
    fn plan<F, Fut>(&self, key: &str, stale_time: Duration, fetch: F) -> ClassiResult<Plan<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClassiResult<T>> + Send + 'static,
    {
        let now = self.inner.clock.now();
        let mut slots = self.inner.lock()?;
        let slot = slots.entry(key.to_string()).or_insert_with(Slot::empty);
        let Slot {
            entry, in_flight, ..
        } = slot;

        if let Some(entry) = entry.as_mut() {
            if !entry.needs_refresh(now, stale_time) {
                self.inner.stats.hit();
                return Ok(Plan::Ready(CacheRead::from_entry(entry, ReadOrigin::Fresh)));
            }

            entry.mark_stale();
            if in_flight.is_none() {
                debug!(
                    key,
                    age = ?entry.age(now),
                    "serving stale value; starting background refresh"
                );
                *in_flight = Some(self.spawn_fetch(key, FetchKind::Background, fetch()));
                self.inner.stats.refresh_started();
            }
            self.inner.stats.stale_hit();
            return Ok(Plan::Ready(CacheRead::from_entry(entry, ReadOrigin::Stale)));
        }

        match in_flight.as_ref() {
            Some(pending) => {
                debug!(key, "joining in-flight fetch");
                self.inner.stats.coalesced();
                Ok(Plan::Wait(pending.fetch.clone()))
            }
            None => {
                debug!(key, "cache miss; fetching");
                self.inner.stats.miss();
                let pending = self.spawn_fetch(key, FetchKind::Initial, fetch());
                let shared = pending.fetch.clone();
                *in_flight = Some(pending);
                Ok(Plan::Wait(shared))
            }
        }
    }

    /// Run `fut` on its own task and return the shared handle to its result.
    fn spawn_fetch<Fut>(&self, key: &str, kind: FetchKind, fut: Fut) -> InFlight<T>
    where
        Fut: Future<Output = ClassiResult<T>> + Send + 'static,
    {
        let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let task_key = key.to_string();

        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(CacheError::FetchTaskFailed {
                    key: task_key.clone(),
                    reason: "fetch panicked".to_string(),
                }
                .into()),
            };
            inner.complete(&task_key, epoch, kind, result)
        });

        let join_key = key.to_string();
        let fetch = async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => Err(CacheError::FetchTaskFailed {
                    key: join_key,
                    reason: err.to_string(),
                }
                .into()),
            }
        }
        .boxed()
        .shared();

        InFlight { epoch, fetch }
    }

    /// Current entry for `key` without fetching.
    pub fn peek(&self, key: &str) -> ClassiResult<Option<CacheRead<T>>> {
        let slots = self.inner.lock()?;
        Ok(slots
            .get(key)
            .and_then(|slot| slot.entry.as_ref())
            .map(|entry| {
                let origin = match entry.state() {
                    EntryState::Fresh => ReadOrigin::Fresh,
                    EntryState::Stale => ReadOrigin::Stale,
                };
                CacheRead::from_entry(entry, origin)
            }))
    }

    /// Whether a fetch for `key` is running.
    pub fn is_refreshing(&self, key: &str) -> ClassiResult<bool> {
        let slots = self.inner.lock()?;
        Ok(slots
            .get(key)
            .map(|slot| slot.in_flight.is_some())
            .unwrap_or(false))
    }

    /// Wait for the in-flight fetch of `key`, if any.
    ///
    /// Returns `Ok(None)` when nothing is running.
    pub async fn wait_for_refresh(&self, key: &str) -> ClassiResult<Option<Arc<T>>> {
        let pending = {
            let slots = self.inner.lock()?;
            slots
                .get(key)
                .and_then(|slot| slot.in_flight.as_ref())
                .map(|in_flight| in_flight.fetch.clone())
        };

        match pending {
            Some(pending) => pending.await.map(|(value, _)| Some(value)),
            None => Ok(None),
        }
    }

    /// Mark every entry whose key starts with `prefix` as stale.
    ///
    /// Values stay readable; the next read of each triggers a refresh. A
    /// fetch already running for a matching key is installed stale, so data
    /// loaded before the invalidation is never served as fresh.
    pub fn invalidate_prefix(&self, prefix: &str) -> ClassiResult<usize> {
        let mut slots = self.inner.lock()?;
        let mut count = 0;
        for (key, slot) in slots.iter_mut() {
            if key.starts_with(prefix) && slot.invalidate() {
                count += 1;
            }
        }
        debug!(prefix, count, "cache entries invalidated");
        Ok(count)
    }

    /// Mark exactly `key` as stale; see [`Self::invalidate_prefix`].
    pub fn invalidate_key(&self, key: &str) -> ClassiResult<bool> {
        let mut slots = self.inner.lock()?;
        let invalidated = slots
            .get_mut(key)
            .map(|slot| slot.invalidate())
            .unwrap_or(false);
        debug!(key, invalidated, "cache entry invalidated");
        Ok(invalidated)
    }

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// Fetches already running finish for their waiters but are not stored.
    pub fn clear_prefix(&self, prefix: &str) -> ClassiResult<usize> {
        let mut slots = self.inner.lock()?;
        let before = slots.values().filter(|slot| slot.entry.is_some()).count();
        slots.retain(|key, _| !key.starts_with(prefix));
        let removed = before - slots.values().filter(|slot| slot.entry.is_some()).count();
        debug!(prefix, removed, "cache entries cleared");
        Ok(removed)
    }

    /// Remove every entry.
    pub fn clear_all(&self) -> ClassiResult<usize> {
        self.clear_prefix("")
    }

    /// Number of stored entries.
    pub fn len(&self) -> ClassiResult<usize> {
        let slots = self.inner.lock()?;
        Ok(slots.values().filter(|slot| slot.entry.is_some()).count())
    }

    pub fn is_empty(&self) -> ClassiResult<bool> {
        self.len().map(|len| len == 0)
    }

    pub fn stats(&self) -> CacheStats {
        let slots = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry_count = slots.values().filter(|slot| slot.entry.is_some()).count() as u64;
        self.inner.stats.snapshot(entry_count)
    }
}

/// A fetch function bound to one cache key; see [`RefreshCache::wrap`].
pub struct CachedFetch<T, F> {
    cache: RefreshCache<T>,
    key: String,
    stale_time: Duration,
    fetch: F,
}

impl<T, F, Fut> CachedFetch<T, F>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = ClassiResult<T>> + Send + 'static,
{
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cache-aware equivalent of calling the wrapped fetch.
    pub async fn get(&self) -> ClassiResult<Arc<T>> {
        self.cache
            .get(&self.key, self.stale_time, &self.fetch)
            .await
    }

    /// Like [`Self::get`] but with staleness metadata.
    pub async fn read(&self) -> ClassiResult<CacheRead<T>> {
        self.cache
            .read(&self.key, self.stale_time, &self.fetch)
            .await
    }

    /// Force the next call to refresh.
    pub fn invalidate(&self) -> ClassiResult<bool> {
        self.cache.invalidate_key(&self.key)
    }
}
