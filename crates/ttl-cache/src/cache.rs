//! Fixed-TTL key/value store

use crate::clock::{Clock, SystemClock};
use crate::types::CacheEntry;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::trace;

/// A string-keyed cache where every value expires a fixed `ttl` after it was set
///
/// All map access goes through one mutex that is never held across an await
/// point, so the cache can be shared freely between request handlers and the
/// [`Sweeper`](crate::Sweeper).
pub struct TtlCache<T> {
    ttl: Duration,
    ttl_delta: TimeDelta,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    /// Create a cache driven by the wall clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache driven by a custom clock
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            ttl_delta: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The lifetime given to every entry on `set`
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or overwrite `key`, resetting its expiry to a full `ttl` from now
    pub fn set(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let expires_at = self.deadline(self.clock.now());
        trace!(key = %key, %expires_at, "cache set");
        self.lock().insert(key, CacheEntry { value, expires_at });
    }

    /// Return a fresh value, dropping the entry if it has expired
    pub fn get(&self, key: &str) -> Option<T> {
        self.get_with_remaining(key).map(|(value, _)| value)
    }

    /// Like [`get`](Self::get), also returning how long the value has left
    pub fn get_with_remaining(&self, key: &str) -> Option<(T, Duration)> {
        let now = self.clock.now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                let remaining = (entry.expires_at - now).to_std().unwrap_or_default();
                return Some((entry.value.clone(), remaining));
            }
            Some(_) => {}
            None => return None,
        }

        entries.remove(key);
        trace!(key, "cache entry expired on read");
        None
    }

    /// Whether `key` holds a fresh value; same lazy removal as `get`
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.lock();

        let fresh = entries.get(key).map(|entry| entry.is_fresh(now));
        if fresh == Some(false) {
            entries.remove(key);
        }
        fresh.unwrap_or(false)
    }

    /// Remove every entry whose deadline is at or before now
    ///
    /// Returns the number of entries removed.
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl_delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        // Every operation leaves the map consistent, so poisoning is ignored
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
