use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default time-to-live for cache entries, mirroring the 24h default used
/// by the original settings/rules cache.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A process-wide, mutex-guarded TTL cache. Expiry is checked lazily on
/// read; there is no background sweep task, since correctness does not
/// depend on prompt eviction (stale entries are simply refetched on the
/// next miss).
///
/// Concurrent misses for the same key may duplicate the underlying fetch;
/// that's fine — `FetchSetting`/rules fetch are idempotent, and the last
/// write to a given key wins.
pub struct TtlCache<V: Clone> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((inserted_at, value)) if inserted_at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    pub fn set(&self, key: String, value: V) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key, (Instant::now(), value));
    }

    /// Fetches `key`, calling `fetch` on a miss (or expiry) and caching
    /// the result.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.set(key.to_owned(), value.clone());
        Ok(value)
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_set_then_hit() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(60));
        assert!(cache.get("k").is_none());
        cache.set("k".to_string(), "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_millis(1));
        cache.set("k".to_string(), "v".to_string());
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("k").is_none());
    }

    #[tokio::test]
    async fn get_or_fetch_caches_result() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        let calls = std::sync::atomic::AtomicU32::new(0);
        let fetch = || async {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok::<u32, ()>(42)
        };
        assert_eq!(cache.get_or_fetch("k", fetch).await, Ok(42));
        assert_eq!(
            cache
                .get_or_fetch("k", || async { Ok::<u32, ()>(99) })
                .await,
            Ok(42)
        );
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
