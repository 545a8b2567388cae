//! Cache-first file resolution

use crate::resolver::{FileResolver, ResolveError};
use crate::types::{CacheStatus, FileIdentity, Resolution};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use ttl_cache::{CacheStats, TtlCache};

/// Serves files from the cache, falling back to a [`FileResolver`] on miss
///
/// Concurrent misses for the same identity are not coalesced: each one
/// fetches and the last write wins.
pub struct FetchOrchestrator<T> {
    cache: Arc<TtlCache<T>>,
    resolver: Arc<dyn FileResolver<T>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> FetchOrchestrator<T> {
    pub fn new(cache: Arc<TtlCache<T>>, resolver: Arc<dyn FileResolver<T>>) -> Self {
        Self {
            cache,
            resolver,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Resolve `identity`, bypassing the cache when `force_refresh` is set
    ///
    /// A failed fetch leaves any existing entry in place and caches nothing.
    pub async fn resolve(
        &self,
        identity: &FileIdentity,
        force_refresh: bool,
    ) -> Result<Resolution<T>, ResolveError> {
        let key = identity.cache_key();

        if !force_refresh {
            if let Some((value, max_age)) = self.cache.get_with_remaining(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache hit");
                return Ok(Resolution {
                    value,
                    status: CacheStatus::Hit,
                    max_age,
                });
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, force_refresh, "Cache miss, fetching from upstream");

        let value = self.resolver.fetch_file(identity).await?;
        self.cache.set(key, value.clone());

        Ok(Resolution {
            value,
            status: CacheStatus::Miss,
            max_age: self.cache.ttl(),
        })
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use ttl_cache::ManualClock;

    /// Resolver returning scripted results and counting calls
    #[derive(Default)]
    struct ScriptedResolver {
        files: Mutex<HashMap<String, Value>>,
        fail_transient: Mutex<bool>,
        calls: AtomicUsize,
    }

    impl ScriptedResolver {
        fn put(&self, key: &str, value: Value) {
            self.files.lock().unwrap().insert(key.to_string(), value);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FileResolver<Value> for ScriptedResolver {
        async fn fetch_file(&self, identity: &FileIdentity) -> Result<Value, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_transient.lock().unwrap() {
                return Err(ResolveError::Transient("connection reset".to_string()));
            }
            self.files
                .lock()
                .unwrap()
                .get(&identity.cache_key())
                .cloned()
                .ok_or(ResolveError::NotFound)
        }
    }

    const TTL: Duration = Duration::from_secs(3600);

    fn setup() -> (
        FetchOrchestrator<Value>,
        Arc<ScriptedResolver>,
        Arc<TtlCache<Value>>,
        Arc<ManualClock>,
    ) {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(TtlCache::<Value>::with_clock(TTL, clock.clone()));
        let resolver = Arc::new(ScriptedResolver::default());
        let orchestrator = FetchOrchestrator::new(cache.clone(), resolver.clone());
        (orchestrator, resolver, cache, clock)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (orchestrator, resolver, _cache, clock) = setup();
        resolver.put("o/r/button.json", json!({ "name": "button" }));
        let identity = FileIdentity::new("o", "r", "button.json");

        let first = orchestrator.resolve(&identity, false).await.unwrap();
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(first.max_age, TTL);
        assert_eq!(first.value["name"], "button");

        clock.advance(Duration::from_secs(600));
        let second = orchestrator.resolve(&identity, false).await.unwrap();
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(second.max_age, Duration::from_secs(3000));
        assert_eq!(resolver.calls(), 1);

        let stats = orchestrator.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let (orchestrator, resolver, _cache, clock) = setup();
        resolver.put("o/r/button.json", json!(1));
        let identity = FileIdentity::new("o", "r", "button.json");

        orchestrator.resolve(&identity, false).await.unwrap();
        clock.advance(TTL);

        let again = orchestrator.resolve(&identity, false).await.unwrap();
        assert_eq!(again.status, CacheStatus::Miss);
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let (orchestrator, resolver, cache, _clock) = setup();
        let identity = FileIdentity::new("owner", "repo", "missing.json");

        let err = orchestrator.resolve(&identity, false).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound));
        assert!(!cache.has("owner/repo/missing.json"));

        let err = orchestrator.resolve(&identity, false).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound));
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_overwrites_fresh_entry() {
        let (orchestrator, resolver, cache, _clock) = setup();
        let identity = FileIdentity::new("o", "r", "button.json");

        resolver.put("o/r/button.json", json!({ "v": 1 }));
        orchestrator.resolve(&identity, false).await.unwrap();

        resolver.put("o/r/button.json", json!({ "v": 2 }));
        let refreshed = orchestrator.resolve(&identity, true).await.unwrap();
        assert_eq!(refreshed.status, CacheStatus::Miss);
        assert_eq!(refreshed.value["v"], 2);
        assert_eq!(resolver.calls(), 2);

        assert_eq!(cache.get("o/r/button.json"), Some(json!({ "v": 2 })));
    }

    #[tokio::test]
    async fn test_force_refresh_resets_ttl() {
        let (orchestrator, resolver, _cache, clock) = setup();
        let identity = FileIdentity::new("o", "r", "button.json");
        resolver.put("o/r/button.json", json!(1));

        orchestrator.resolve(&identity, false).await.unwrap();
        clock.advance(TTL / 2);
        orchestrator.resolve(&identity, true).await.unwrap();
        clock.advance(TTL / 2);

        let hit = orchestrator.resolve(&identity, false).await.unwrap();
        assert_eq!(hit.status, CacheStatus::Hit);
        assert_eq!(hit.max_age, TTL / 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_entry() {
        let (orchestrator, resolver, cache, _clock) = setup();
        let identity = FileIdentity::new("o", "r", "button.json");
        resolver.put("o/r/button.json", json!({ "v": 1 }));
        orchestrator.resolve(&identity, false).await.unwrap();

        *resolver.fail_transient.lock().unwrap() = true;
        let err = orchestrator.resolve(&identity, true).await.unwrap_err();
        assert!(matches!(err, ResolveError::Transient(_)));

        assert_eq!(cache.get("o/r/button.json"), Some(json!({ "v": 1 })));
        let hit = orchestrator.resolve(&identity, false).await.unwrap();
        assert_eq!(hit.status, CacheStatus::Hit);
    }

    #[tokio::test]
    async fn test_forced_not_found_keeps_existing_entry() {
        let (orchestrator, resolver, cache, _clock) = setup();
        let identity = FileIdentity::new("o", "r", "button.json");
        resolver.put("o/r/button.json", json!(1));
        orchestrator.resolve(&identity, false).await.unwrap();

        resolver.files.lock().unwrap().clear();
        let err = orchestrator.resolve(&identity, true).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound));
        assert!(cache.has("o/r/button.json"));
    }
}
