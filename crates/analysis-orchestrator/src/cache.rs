use analysis_core::{AnalysisError, MetricSnapshot, MetricsFetcher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

type Slot = Arc<OnceCell<CacheEntry<MetricSnapshot>>>;

/// Wraps a [`MetricsFetcher`] with a TTL snapshot cache keyed by upper-cased
/// ticker.
///
/// Concurrent callers asking for the same ticker share one in-flight fetch,
/// so a scan hits the inner fetcher at most once per ticker and TTL. Failed
/// fetches are never cached; the next caller retries.
///
/// No timeout is applied here. The inner fetcher bounds its own HTTP
/// exchanges, and time spent queued behind its rate limiter is not a failure.
pub struct CachedMetricsFetcher {
    inner: Arc<dyn MetricsFetcher>,
    snapshot_cache: DashMap<String, Slot>,
    ttl_secs: i64,
}

impl CachedMetricsFetcher {
    pub fn new(inner: Arc<dyn MetricsFetcher>, ttl: Duration) -> Self {
        Self {
            inner,
            snapshot_cache: DashMap::new(),
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry<MetricSnapshot>) -> bool {
        (Utc::now() - entry.cached_at).num_seconds() < self.ttl_secs
    }

    async fn load(&self, ticker: &str) -> Result<CacheEntry<MetricSnapshot>, AnalysisError> {
        let data = self.inner.fetch(ticker).await?;
        Ok(CacheEntry {
            data,
            cached_at: Utc::now(),
        })
    }

    /// Slot for `key`, replacing it when its snapshot has expired. An
    /// in-flight slot is never replaced.
    fn slot(&self, key: &str) -> Slot {
        let mut slot = self.snapshot_cache.entry(key.to_string()).or_default();
        if slot.get().is_some_and(|entry| !self.is_fresh(entry)) {
            *slot = Slot::default();
        }
        Arc::clone(slot.value())
    }
}

#[async_trait]
impl MetricsFetcher for CachedMetricsFetcher {
    async fn fetch(&self, ticker: &str) -> Result<MetricSnapshot, AnalysisError> {
        let cache_key = ticker.trim().to_uppercase();
        let slot = self.slot(&cache_key);

        if let Some(entry) = slot.get() {
            tracing::debug!("{}: snapshot cache hit", cache_key);
            return Ok(entry.data.clone());
        }

        let entry = slot.get_or_try_init(|| self.load(&cache_key)).await?;

        Ok(entry.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0), fail: false, delay: Duration::ZERO }
        }
    }

    #[async_trait]
    impl MetricsFetcher for CountingFetcher {
        async fn fetch(&self, ticker: &str) -> Result<MetricSnapshot, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(AnalysisError::ApiError("boom".to_string()));
            }
            Ok(MetricSnapshot {
                pe: Some(12.0),
                ..MetricSnapshot::new(ticker)
            })
        }
    }

    #[tokio::test]
    async fn test_second_fetch_hits_cache() {
        let inner = Arc::new(CountingFetcher::new());
        let cached = CachedMetricsFetcher::new(inner.clone(), Duration::from_secs(900));

        let a = cached.fetch("amd").await.unwrap();
        let b = cached.fetch(" AMD").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.ticker, "AMD");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refetches() {
        let inner = Arc::new(CountingFetcher::new());
        let cached = CachedMetricsFetcher::new(inner.clone(), Duration::ZERO);

        cached.fetch("AMD").await.unwrap();
        cached.fetch("AMD").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = Arc::new(CountingFetcher { fail: true, ..CountingFetcher::new() });
        let cached = CachedMetricsFetcher::new(inner.clone(), Duration::from_secs(900));

        assert!(cached.fetch("AMD").await.is_err());
        assert!(cached.fetch("AMD").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let inner = Arc::new(CountingFetcher { delay: Duration::from_millis(50), ..CountingFetcher::new() });
        let cached = Arc::new(CachedMetricsFetcher::new(inner.clone(), Duration::from_secs(900)));

        let mut handles = Vec::new();
        for ticker in ["AMD", "amd", "NVDA", "AMD", "nvda"] {
            let cached = Arc::clone(&cached);
            handles.push(tokio::spawn(async move { cached.fetch(ticker).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    /// Stands in for a rate-limited client: requests queue for a slot, and
    /// only the exchange itself counts against the client's own timeout.
    struct QueuedFetcher {
        slot: tokio::sync::Mutex<()>,
        exchange: Duration,
        calls: Mutex<HashMap<String, usize>>,
    }

    #[async_trait]
    impl MetricsFetcher for QueuedFetcher {
        async fn fetch(&self, ticker: &str) -> Result<MetricSnapshot, AnalysisError> {
            *self.calls.lock().unwrap().entry(ticker.to_string()).or_default() += 1;
            let _slot = self.slot.lock().await;
            tokio::time::sleep(self.exchange).await;
            Ok(MetricSnapshot::new(ticker))
        }
    }

    #[tokio::test]
    async fn test_fetch_queued_behind_rate_limit_is_not_cut_off() {
        let inner = Arc::new(QueuedFetcher {
            slot: tokio::sync::Mutex::new(()),
            exchange: Duration::from_millis(40),
            calls: Mutex::new(HashMap::new()),
        });
        let cached = Arc::new(CachedMetricsFetcher::new(inner.clone(), Duration::from_secs(900)));

        // Six distinct tickers through one slot: the last waits ~200ms in
        // the queue, far longer than any single exchange.
        let tickers = ["AMD", "NVDA", "INTC", "AAPL", "MSFT", "ORCL"];
        let mut handles = Vec::new();
        for ticker in tickers {
            let cached = Arc::clone(&cached);
            handles.push(tokio::spawn(async move { cached.fetch(ticker).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let calls = inner.calls.lock().unwrap();
        assert_eq!(calls.len(), tickers.len());
        assert!(calls.values().all(|n| *n == 1));
    }
}
