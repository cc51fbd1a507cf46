//! Search orchestration: validate, consult the cache, fetch, rank, store

use crate::config::Config;
use crate::search::{
    CacheKey, CacheStats, InvalidationFilter, ResultCache, ResultEnvelope, ScoreEngine,
    SearchCriteria, SearchError, SourceClient, SourceFetcher,
};
use ahash::{HashMap, HashMapExt};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type SearchResult = Result<Arc<ResultEnvelope>, SearchError>;
type SharedSearch = Shared<BoxFuture<'static, SearchResult>>;

/// Entry point for callers. Cheap to clone; clones share the cache and the
/// in-flight request table.
#[derive(Clone)]
pub struct SearchOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: SourceFetcher,
    scorer: ScoreEngine,
    cache: Mutex<ResultCache>,
    /// Uncached searches currently running, keyed by fingerprint. A second
    /// identical request awaits the first instead of fetching again. Each
    /// entry is removed by its own task when the search settles.
    in_flight: Mutex<HashMap<CacheKey, SharedSearch>>,
    max_result_count: u32,
    per_source_floor: u32,
}

impl SearchOrchestrator {
    /// Build an orchestrator with a cache sized from configuration
    pub fn new(client: Arc<dyn SourceClient>, config: &Config) -> crate::Result<Self> {
        let cache = ResultCache::from_config(&config.cache)?;
        Self::with_cache(client, cache, config)
    }

    /// Build an orchestrator around an existing cache
    pub fn with_cache(
        client: Arc<dyn SourceClient>,
        cache: ResultCache,
        config: &Config,
    ) -> crate::Result<Self> {
        let fetcher = SourceFetcher::new(client, config.fetch.overall_timeout()?);

        Ok(Self {
            inner: Arc::new(Inner {
                fetcher,
                scorer: ScoreEngine::new(&config.scoring),
                cache: Mutex::new(cache),
                in_flight: Mutex::new(HashMap::new()),
                max_result_count: config.search.max_result_count,
                per_source_floor: config.fetch.per_source_floor,
            }),
        })
    }

    /// Run one search.
    ///
    /// Invalid criteria fail before any I/O. A cache hit returns the stored
    /// envelope unchanged. On a miss the sources are fetched, ranked and the
    /// envelope cached; failures are never cached.
    pub async fn execute(&self, criteria: SearchCriteria) -> SearchResult {
        criteria.validate(self.inner.max_result_count)?;

        let started = Instant::now();
        let key = criteria.cache_key();

        if let Some(hit) = self.inner.cache.lock().await.get(&key) {
            debug!("Cache hit for key: {}", key);
            return Ok(hit);
        }

        let search = {
            let mut in_flight = self.inner.in_flight.lock().await;

            // A leader may have finished between the first lookup and now
            if let Some(hit) = self.inner.cache.lock().await.get(&key) {
                debug!("Cache hit for key: {}", key);
                return Ok(hit);
            }

            match in_flight.get(&key) {
                Some(existing) => {
                    debug!("Joining in-flight search for key: {}", key);
                    existing.clone()
                }
                None => {
                    debug!("Cache miss for key: {}", key);
                    // Spawned so the search settles and leaves the table even
                    // if every waiter is dropped
                    let leader = tokio::spawn(self.inner.clone().run_uncached(
                        criteria,
                        key.clone(),
                        started,
                    ));
                    let search = async move {
                        leader.await.unwrap_or_else(|e| {
                            Err(SearchError::UpstreamUnavailable(format!(
                                "Search task failed: {}",
                                e
                            )))
                        })
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, search.clone());
                    search
                }
            }
        };

        search.await
    }

    /// Drop cached results matching the filter
    pub async fn invalidate(&self, filter: &InvalidationFilter) -> usize {
        self.inner.cache.lock().await.invalidate(filter)
    }

    pub async fn clear_cache(&self) {
        self.inner.cache.lock().await.clear();
        info!("Search cache cleared");
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.cache.lock().await.stats()
    }

    pub fn max_result_count(&self) -> u32 {
        self.inner.max_result_count
    }
}

impl Inner {
    async fn run_uncached(
        self: Arc<Self>,
        criteria: SearchCriteria,
        key: CacheKey,
        started: Instant,
    ) -> SearchResult {
        let result = self.fetch_and_rank(criteria, started).await;

        if let Ok(envelope) = &result {
            // The result is still valid if it cannot be cached
            if let Err(e) = self.cache.lock().await.set(key.clone(), envelope.clone()) {
                warn!("Failed to cache search result: {}", e);
            }
        }

        self.in_flight.lock().await.remove(&key);
        result
    }

    async fn fetch_and_rank(&self, criteria: SearchCriteria, started: Instant) -> SearchResult {
        info!(
            "Searching {} source(s), window={}, count={}",
            criteria.sources.len(),
            criteria.time_window,
            criteria.result_count
        );

        // Over-fetch so enough candidates survive the eligibility filter
        let per_source = criteria.result_count.max(self.per_source_floor);

        let items = self
            .fetcher
            .fetch_all(&criteria.sources, criteria.time_window, per_source)
            .await?
            .into_items()?;

        let candidates = items.len();
        let mut ranked = self.scorer.rank(items);
        ranked.truncate(criteria.result_count as usize);

        let execution_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "Search completed: {} of {} candidates in {}ms",
            ranked.len(),
            candidates,
            execution_time_ms
        );

        Ok(Arc::new(ResultEnvelope {
            total_found: ranked.len(),
            items: ranked,
            criteria_used: criteria,
            execution_time_ms,
        }))
    }
}
