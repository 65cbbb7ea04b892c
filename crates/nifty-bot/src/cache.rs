//! Short-lived cache for market data so a sweep never fetches a ticker twice

use cached::{Cached, TimedCache};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key for market data requests
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Provider ticker, e.g. `TCS.NS`
    pub ticker: String,
    /// Request kind, e.g. `quote` or `daily:60`
    pub endpoint: String,
}

impl CacheKey {
    pub fn new(ticker: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn quote(ticker: &str) -> Self {
        Self::new(ticker, "quote")
    }

    pub fn daily(ticker: &str, days: u32) -> Self {
        Self::new(ticker, format!("daily:{days}"))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ticker, self.endpoint)
    }
}

/// Thread-safe TTL cache, cheap to clone
pub struct MarketCache<V> {
    cache: Arc<RwLock<TimedCache<CacheKey, V>>>,
}

impl<V: Clone> MarketCache<V> {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        // TimedCache evicts on read, so a read still needs the write lock
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: V) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value or run `fetcher` and cache its success
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(%key, "cache hit");
            return Ok(value);
        }

        tracing::debug!(%key, "cache miss");
        let value = fetcher().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }
}

impl<V> Clone for MarketCache<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}
