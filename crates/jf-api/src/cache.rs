//! Per-country cache of contract-filtered analytics rows.
//!
//! The dashboard reads the same few aggregates over and over while the
//! ingestor only writes once a day, so rows are kept for a configurable TTL
//! instead of being fetched on every request.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jf_common::analytics::{AnalyticsError, AnalyticsRow};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedRows {
    loaded_at: Instant,
    rows: Arc<Vec<AnalyticsRow>>,
}

#[derive(Debug)]
pub struct RowCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedRows>>,
}

impl RowCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn fresh(&self, key: &str) -> Option<Arc<Vec<AnalyticsRow>>> {
        self.entries
            .read()
            .await
            .get(key)
            .filter(|cached| cached.loaded_at.elapsed() < self.ttl)
            .map(|cached| Arc::clone(&cached.rows))
    }

    /// Returns the cached rows for `country`, calling `fetch` when the entry
    /// is missing or older than the TTL. A failed fetch leaves the previous
    /// entry in place.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        country: &str,
        fetch: F,
    ) -> Result<Arc<Vec<AnalyticsRow>>, AnalyticsError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<AnalyticsRow>, AnalyticsError>>,
    {
        let key = country.trim().to_lowercase();
        if let Some(rows) = self.fresh(&key).await {
            jf_metrics::record_cache_lookup(true);
            return Ok(rows);
        }
        jf_metrics::record_cache_lookup(false);

        let rows = Arc::new(fetch().await?);
        debug!(country = %key, rows = rows.len(), "row cache refreshed");
        self.entries.write().await.insert(
            key,
            CachedRows {
                loaded_at: Instant::now(),
                rows: Arc::clone(&rows),
            },
        );
        Ok(rows)
    }

    /// Seeds an entry as if it had just been fetched.
    pub async fn prime(&self, country: &str, rows: Vec<AnalyticsRow>) {
        self.entries.write().await.insert(
            country.trim().to_lowercase(),
            CachedRows {
                loaded_at: Instant::now(),
                rows: Arc::new(rows),
            },
        );
    }

    pub async fn invalidate(&self, country: &str) {
        self.entries
            .write()
            .await
            .remove(&country.trim().to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn counting_fetch(calls: &AtomicUsize) -> Result<Vec<AnalyticsRow>, AnalyticsError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    #[tokio::test]
    async fn serves_cached_rows_within_ttl() {
        let cache = RowCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_fetch("Finland", || counting_fetch(&calls)).await.unwrap();
        let second = cache.get_or_fetch("finland", || counting_fetch(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn refetches_after_ttl_or_invalidation() {
        let cache = RowCache::new(Duration::ZERO);
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch("finland", || counting_fetch(&calls)).await.unwrap();
        cache.get_or_fetch("finland", || counting_fetch(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let cache = RowCache::new(Duration::from_secs(60));
        cache.prime("finland", Vec::new()).await;
        cache.invalidate("FINLAND").await;
        cache.get_or_fetch("finland", || counting_fetch(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let cache = RowCache::new(Duration::from_secs(60));
        let err = cache
            .get_or_fetch("finland", || async {
                Err(AnalyticsError::Pool(deadpool_postgres::PoolError::Closed))
            })
            .await;
        assert!(err.is_err());

        let calls = AtomicUsize::new(0);
        cache.get_or_fetch("finland", || counting_fetch(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
