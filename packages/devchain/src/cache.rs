//! Query cache with TTL and max-size eviction
//!
//! Read paths (token balances, metadata) memoize chain queries here. After the
//! chain is reverted every entry is stale, so the setup routine clears the
//! cache through [`CacheInvalidator::invalidate_all`].

use async_trait::async_trait;
use eyre::Result;
use std::collections::HashMap;
use std::env;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_QUERY_CACHE_SIZE: usize = 1_024;
const DEFAULT_QUERY_CACHE_TTL_SECS: u64 = 60;

/// Cache sizing, read from environment variables with defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_QUERY_CACHE_SIZE,
            ttl_secs: DEFAULT_QUERY_CACHE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            max_size: env::var("QUERY_CACHE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_QUERY_CACHE_SIZE),
            ttl_secs: env::var("QUERY_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_QUERY_CACHE_TTL_SECS),
        }
    }
}

/// Drops all cached query state so dependents refetch
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate_all(&self) -> Result<()>;
}

struct Entries<V> {
    map: HashMap<String, (V, Instant)>,
    max_size: usize,
    ttl: Duration,
}

impl<V> Entries<V> {
    fn get(&self, key: &str) -> Option<&V> {
        self.map
            .get(key)
            .filter(|(_, t)| t.elapsed() < self.ttl)
            .map(|(v, _)| v)
    }

    fn insert(&mut self, key: String, value: V) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.map.retain(|_, (_, t)| now.duration_since(*t) < ttl);
        while self.map.len() >= self.max_size && !self.map.is_empty() {
            let oldest = self
                .map
                .iter()
                .min_by_key(|(_, (_, t))| *t)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                self.map.remove(&k);
            } else {
                break;
            }
        }
        self.map.insert(key, (value, now));
    }
}

/// Bounded cache of query results keyed by a query string
///
/// - **Max capacity:** when full, the oldest entry is evicted on insert.
/// - **TTL:** expired entries are never returned and are pruned on insert.
pub struct QueryCache<V> {
    entries: Mutex<Entries<V>>,
}

impl<V: Clone + Send> QueryCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                max_size: config.max_size.max(1),
                ttl: Duration::from_secs(config.ttl_secs),
            }),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.lock().await.insert(key.into(), value);
    }

    /// Return the cached value, or run `fetch` and cache its result
    ///
    /// Fetch errors are returned as-is and nothing is cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key).await {
            debug!(key = %key, "Query cache hit");
            return Ok(value);
        }
        let value = fetch().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<V: Clone + Send> CacheInvalidator for QueryCache<V> {
    async fn invalidate_all(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        debug!(entries = entries.map.len(), "Invalidating query cache");
        entries.map.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_size: usize, ttl_secs: u64) -> QueryCache<u64> {
        QueryCache::new(CacheConfig { max_size, ttl_secs })
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = cache(10, 3600);
        assert!(cache.get("balance").await.is_none());
        cache.insert("balance", 42).await;
        assert_eq!(cache.get("balance").await, Some(42));
    }

    #[tokio::test]
    async fn test_evicts_oldest() {
        let cache = cache(2, 3600);
        cache.insert("a", 1).await;
        cache.insert("b", 2).await;
        cache.insert("c", 3).await;
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.get("c").await, Some(3));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_hits() {
        let cache = cache(10, 0);
        cache.insert("a", 1).await;
        assert!(cache.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_fetch_memoizes() {
        let cache = cache(10, 3600);
        let first = cache.get_or_fetch("k", || async { Ok(7) }).await.unwrap();
        let second = cache
            .get_or_fetch("k", || async { Err(eyre::eyre!("should not refetch")) })
            .await
            .unwrap();
        assert_eq!(first, 7);
        assert_eq!(second, 7);
    }

    #[tokio::test]
    async fn test_get_or_fetch_does_not_cache_errors() {
        let cache = cache(10, 3600);
        let err = cache
            .get_or_fetch("k", || async { Err(eyre::eyre!("rpc down")) })
            .await;
        assert!(err.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_all_clears_everything() {
        let cache = cache(10, 3600);
        cache.insert("a", 1).await;
        cache.insert("b", 2).await;
        cache.invalidate_all().await.unwrap();
        assert!(cache.is_empty().await);
        assert!(cache.get("a").await.is_none());
    }
}
