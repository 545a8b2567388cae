//! Cache types

use chrono::{DateTime, Utc};

/// A stored value and the instant it stops being served
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Expiry is strict: an entry whose deadline equals `now` is already gone
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Hit/miss counters reported alongside the cache size
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}
