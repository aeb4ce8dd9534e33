//! Cache entries and the read results handed to callers.
//!
//! Entries are owned by the cache. Callers only ever receive a
//! [`CacheRead`] holding an `Arc` of the value, so a background refresh can
//! replace the entry without touching anything a caller holds.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Freshness flag stored with each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryState {
    /// Served as-is until its staleness window elapses.
    #[default]
    Fresh,
    /// Still served, but the next read must trigger a refresh.
    Stale,
}

/// A stored value with the time it was fetched.
#[derive(Debug)]
pub struct CacheEntry<T> {
    value: Arc<T>,
    stored_at: DateTime<Utc>,
    state: EntryState,
}

impl<T> CacheEntry<T> {
    pub fn fresh(value: Arc<T>, stored_at: DateTime<Utc>) -> Self {
        Self {
            value,
            stored_at,
            state: EntryState::Fresh,
        }
    }

    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn mark_stale(&mut self) {
        self.state = EntryState::Stale;
    }

    /// Time since the value was stored, clamped at zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether a read at `now` must schedule a refresh.
    pub fn needs_refresh(&self, now: DateTime<Utc>, stale_time: Duration) -> bool {
        self.state == EntryState::Stale || self.age(now) >= stale_time
    }
}

/// How a read was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrigin {
    /// No usable entry; the caller waited for a fetch (possibly shared).
    Fetched,
    /// Served from an entry inside its staleness window.
    Fresh,
    /// Served from a stale entry while a refresh runs in the background.
    Stale,
}

/// Result of a cache read, carrying staleness metadata.
#[derive(Debug)]
pub struct CacheRead<T> {
    value: Arc<T>,
    stored_at: DateTime<Utc>,
    origin: ReadOrigin,
}

impl<T> Clone for CacheRead<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            stored_at: self.stored_at,
            origin: self.origin,
        }
    }
}

impl<T> CacheRead<T> {
    pub(crate) fn new(value: Arc<T>, stored_at: DateTime<Utc>, origin: ReadOrigin) -> Self {
        Self {
            value,
            stored_at,
            origin,
        }
    }

    pub(crate) fn from_entry(entry: &CacheEntry<T>, origin: ReadOrigin) -> Self {
        Self::new(Arc::clone(&entry.value), entry.stored_at, origin)
    }

    /// Consume the wrapper and return the shared value.
    pub fn into_value(self) -> Arc<T> {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    pub fn origin(&self) -> ReadOrigin {
        self.origin
    }

    pub fn was_stale(&self) -> bool {
        self.origin == ReadOrigin::Stale
    }

    pub fn was_fetched(&self) -> bool {
        self.origin == ReadOrigin::Fetched
    }

    /// Age of the value as of `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
