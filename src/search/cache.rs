//! Bounded result cache with per-entry expiry
//!
//! Eviction is by insertion order: when the store is full and a new key
//! arrives, the entry inserted longest ago is dropped. Reads never refresh
//! an entry's position. Expired entries are removed lazily when read.

use crate::config::CacheConfig;
use crate::search::{ResultEnvelope, SearchCriteria, TimeWindow};
use ahash::{HashMap, HashMapExt};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache capacity must be greater than 0")]
    ZeroCapacity,

    #[error("Cache entry TTL must be greater than 0")]
    ZeroTtl,
}

/// Order-independent fingerprint of a search
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(criteria.time_window.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(&criteria.result_count.to_le_bytes());

        // BTreeSet iterates sorted; length prefixes keep names unambiguous
        for source in &criteria.sources {
            hasher.update(&(source.len() as u64).to_le_bytes());
            hasher.update(source.as_bytes());
        }

        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Selects cached entries to drop. When both fields are set, an entry must
/// match both.
#[derive(Debug, Clone, Default)]
pub struct InvalidationFilter {
    pub time_window: Option<TimeWindow>,
    pub sources: Option<BTreeSet<String>>,
}

impl InvalidationFilter {
    pub fn by_time_window(time_window: TimeWindow) -> Self {
        Self {
            time_window: Some(time_window),
            sources: None,
        }
    }

    pub fn by_sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            time_window: None,
            sources: Some(sources.into_iter().map(Into::into).collect()),
        }
    }

    pub fn with_time_window(mut self, time_window: TimeWindow) -> Self {
        self.time_window = Some(time_window);
        self
    }

    /// An empty filter matches nothing
    pub fn matches(&self, criteria: &SearchCriteria) -> bool {
        if self.time_window.is_none() && self.sources.is_none() {
            return false;
        }

        let window_ok = self
            .time_window
            .map_or(true, |window| criteria.time_window == window);
        let sources_ok = self
            .sources
            .as_ref()
            .map_or(true, |sources| !criteria.sources.is_disjoint(sources));

        window_ok && sources_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
}

struct CacheEntry {
    payload: Arc<ResultEnvelope>,
    inserted_at: Instant,
    ttl: Duration,
    /// Monotonic insertion counter; breaks ties between equal instants
    insertion: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

/// Capacity-bounded map from search fingerprint to result envelope
pub struct ResultCache {
    entries: HashMap<CacheKey, CacheEntry>,
    max_size: usize,
    default_ttl: Duration,
    next_insertion: u64,
}

impl ResultCache {
    pub fn new(max_size: usize, default_ttl: Duration) -> Result<Self, CacheError> {
        if max_size == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        if default_ttl.is_zero() {
            return Err(CacheError::ZeroTtl);
        }

        Ok(Self {
            entries: HashMap::with_capacity(max_size),
            max_size,
            default_ttl,
            next_insertion: 0,
        })
    }

    pub fn from_config(config: &CacheConfig) -> crate::Result<Self> {
        let ttl = config.ttl()?;
        Self::new(config.max_size, ttl)
            .map_err(|e| crate::ViralscanError::Config(e.to_string()))
    }

    /// Look up a key. Expired entries are removed and reported as misses.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<ResultEnvelope>> {
        let now = Instant::now();
        let expired = self.entries.get(key)?.is_expired(now);

        if expired {
            self.entries.remove(key);
            tracing::debug!("Cache entry expired: {}", key);
            return None;
        }

        self.entries.get(key).map(|entry| entry.payload.clone())
    }

    /// Insert with the default TTL
    pub fn set(&mut self, key: CacheKey, payload: Arc<ResultEnvelope>) -> Result<(), CacheError> {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, payload, ttl)
    }

    pub fn set_with_ttl(
        &mut self,
        key: CacheKey,
        payload: Arc<ResultEnvelope>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::ZeroTtl);
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_oldest();
        }

        let insertion = self.next_insertion;
        self.next_insertion += 1;

        self.entries.insert(
            key,
            CacheEntry {
                payload,
                inserted_at: Instant::now(),
                ttl,
                insertion,
            },
        );

        Ok(())
    }

    /// Remove every entry whose stored criteria match the filter.
    /// Returns the number of entries removed.
    pub fn invalidate(&mut self, filter: &InvalidationFilter) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !filter.matches(&entry.payload.criteria_used));
        let removed = before - self.entries.len();

        if removed > 0 {
            tracing::debug!("Invalidated {} cache entries", removed);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.insertion)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            tracing::debug!("Evicted oldest cache entry: {}", key);
        }
    }
}
