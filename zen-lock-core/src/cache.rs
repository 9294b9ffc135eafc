//! BundleCache + CacheManager (C2) — spec.md §4.2.
//!
//! TTL-based map with a background sweep task, grounded on `citadel-api`'s
//! rate-limiter bucket map (`RateLimiter { buckets: Mutex<HashMap<...>> }`,
//! cleaned up by a `tokio::spawn`ed `tokio::time::interval` loop). Here the
//! lock is `tokio::sync::RwLock` (reads don't block each other) instead of
//! the teacher's plain `Mutex`, since `Get` is the hot path and is read-only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::model::Bundle;

/// `(namespace, name)` — the identity a bundle is cached under.
pub type CacheKey = (String, String);

struct Entry<T> {
    value: T,
    deadline: Instant,
}

/// TTL cache, generic over the cached value so it can be unit-tested
/// without the CRD crate's `kube`-backed `Bundle` wrapper.
pub struct BundleCache<T> {
    entries: RwLock<HashMap<CacheKey, Entry<T>>>,
    ttl: Duration,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Clone + Send + Sync + 'static> BundleCache<T> {
    /// Construct a cache and start its background sweep task, which wakes
    /// every `ttl / 2` and deletes expired entries.
    pub fn new(ttl: Duration) -> Arc<Self> {
        let cache = Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            sweep_handle: Mutex::new(None),
        });
        cache.clone().spawn_sweeper();
        cache
    }

    fn spawn_sweeper(self: Arc<Self>) {
        let period = (self.ttl / 2).max(Duration::from_millis(1));
        let weak = Arc::downgrade(&self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(cache) => cache.sweep_expired().await,
                    None => break,
                }
            }
        });
        *self.sweep_handle.lock().unwrap() = Some(handle);
    }

    async fn sweep_expired(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.deadline > now);
    }

    /// Deep-copy read; expired entries are treated as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<T> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.get(key).filter(|entry| entry.deadline > now).map(|entry| entry.value.clone())
    }

    /// `Get` on a nil receiver returns miss — the Rust analogue of a nil
    /// pointer is `Option<&BundleCache<T>>`, so callers that may or may not
    /// have a cache configured use this instead of unwrapping.
    pub async fn get_optional(cache: Option<&Self>, key: &CacheKey) -> Option<T> {
        match cache {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    /// Deep-copy write; resets the entry's deadline to `now + ttl`.
    pub async fn set(&self, key: CacheKey, value: T) {
        let deadline = Instant::now() + self.ttl;
        self.entries.write().await.insert(key, Entry { value, deadline });
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        self.entries.write().await.remove(key);
    }

    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Cancel the background sweep task. Safe to call more than once.
    pub fn stop(&self) {
        if let Some(handle) = self.sweep_handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl<T> Drop for BundleCache<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweep_handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

/// Process-wide registry of weak references to every live `BundleCache<Bundle>`
/// in the process, so that a decryption failure in one injector instance can
/// invalidate every cache sharing the process (spec.md §4.2, §9
/// "Cache-manager globalism" — one explicitly constructed manager, injected
/// into both the cache constructor and the injector, never a true global).
#[derive(Default)]
pub struct CacheManager {
    caches: Mutex<Vec<Weak<BundleCache<Bundle>>>>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, cache: &Arc<BundleCache<Bundle>>) {
        self.caches.lock().unwrap().push(Arc::downgrade(cache));
    }

    /// Fan out `invalidate_all` to every still-live registered cache,
    /// pruning dead weak references opportunistically.
    pub async fn invalidate_all(&self) {
        let live: Vec<Arc<BundleCache<Bundle>>> = {
            let mut caches = self.caches.lock().unwrap();
            caches.retain(|weak| weak.strong_count() > 0);
            caches.iter().filter_map(Weak::upgrade).collect()
        };
        for cache in live {
            cache.invalidate_all().await;
        }
    }

    pub fn registered_count(&self) -> usize {
        self.caches.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ns: &str, name: &str) -> CacheKey {
        (ns.to_string(), name.to_string())
    }

    #[tokio::test]
    async fn get_on_unknown_key_is_miss() {
        let cache: Arc<BundleCache<String>> = BundleCache::new(Duration::from_secs(60));
        assert_eq!(cache.get(&key("app", "x")).await, None);
    }

    #[tokio::test]
    async fn get_optional_on_none_is_miss() {
        assert_eq!(BundleCache::<String>::get_optional(None, &key("app", "x")).await, None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache: Arc<BundleCache<String>> = BundleCache::new(Duration::from_secs(60));
        cache.set(key("app", "x"), "value".to_string()).await;
        assert_eq!(cache.get(&key("app", "x")).await, Some("value".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_is_miss() {
        let cache: Arc<BundleCache<String>> = BundleCache::new(Duration::from_millis(20));
        cache.set(key("app", "x"), "value".to_string()).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get(&key("app", "x")).await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache: Arc<BundleCache<String>> = BundleCache::new(Duration::from_secs(60));
        cache.set(key("app", "x"), "value".to_string()).await;
        cache.invalidate(&key("app", "x")).await;
        assert_eq!(cache.get(&key("app", "x")).await, None);
    }

    #[tokio::test]
    async fn invalidate_all_clears_everything() {
        let cache: Arc<BundleCache<String>> = BundleCache::new(Duration::from_secs(60));
        cache.set(key("app", "x"), "a".to_string()).await;
        cache.set(key("app", "y"), "b".to_string()).await;
        cache.invalidate_all().await;
        assert_eq!(cache.size().await, 0);
    }

    #[tokio::test]
    async fn size_reflects_entry_count() {
        let cache: Arc<BundleCache<String>> = BundleCache::new(Duration::from_secs(60));
        assert_eq!(cache.size().await, 0);
        cache.set(key("app", "x"), "a".to_string()).await;
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn background_sweep_evicts_expired_entries_without_explicit_get() {
        let cache: Arc<BundleCache<String>> = BundleCache::new(Duration::from_millis(20));
        cache.set(key("app", "x"), "value".to_string()).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.size().await, 0);
    }

    #[tokio::test]
    async fn stop_cancels_background_sweep() {
        let cache: Arc<BundleCache<String>> = BundleCache::new(Duration::from_millis(20));
        cache.stop();
        cache.set(key("app", "x"), "value".to_string()).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        // Entry is still technically expired-by-deadline, but `get` still
        // honours the deadline check even without the sweep task running.
        assert_eq!(cache.get(&key("app", "x")).await, None);
    }

    #[tokio::test]
    async fn cache_manager_invalidate_all_fans_out() {
        use crate::model::{Bundle, BundleSpec};

        let manager = CacheManager::new();
        let cache_a: Arc<BundleCache<Bundle>> = BundleCache::new(Duration::from_secs(60));
        let cache_b: Arc<BundleCache<Bundle>> = BundleCache::new(Duration::from_secs(60));
        manager.register(&cache_a);
        manager.register(&cache_b);

        let bundle = Bundle::new("app", "db-creds", BundleSpec::default());
        cache_a.set(key("app", "db-creds"), bundle.clone()).await;
        cache_b.set(key("app", "db-creds"), bundle).await;

        manager.invalidate_all().await;

        assert_eq!(cache_a.size().await, 0);
        assert_eq!(cache_b.size().await, 0);
    }

    #[tokio::test]
    async fn cache_manager_prunes_dropped_caches() {
        let manager = CacheManager::new();
        {
            let cache: Arc<BundleCache<Bundle>> = BundleCache::new(Duration::from_secs(60));
            manager.register(&cache);
            assert_eq!(manager.registered_count(), 1);
        }
        manager.invalidate_all().await;
        assert_eq!(manager.registered_count(), 0);
    }
}
