//! Search engine: scoring, concurrent source fetching, result caching and
//! the orchestrator that composes them.

mod cache;
mod error;
mod fetcher;
mod orchestrator;
mod score;

pub use cache::{CacheError, CacheKey, CacheStats, InvalidationFilter, ResultCache};
pub use error::{ErrorKind, SearchError, DEFAULT_RETRY_AFTER};
pub use fetcher::{
    FetchReport, SourceClient, SourceError, SourceErrorKind, SourceFailure, SourceFetcher,
    SourceOutcome,
};
pub use orchestrator::SearchOrchestrator;
pub use score::ScoreEngine;

use crate::config::SearchConfig;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// How far back a search looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "10d")]
    TenDays,
    #[serde(rename = "100d")]
    HundredDays,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Hour => "1h",
            TimeWindow::Day => "1d",
            TimeWindow::TenDays => "10d",
            TimeWindow::HundredDays => "100d",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(TimeWindow::Hour),
            "1d" => Ok(TimeWindow::Day),
            "10d" => Ok(TimeWindow::TenDays),
            "100d" => Ok(TimeWindow::HundredDays),
            other => Err(format!(
                "Time window must be one of 1h, 1d, 10d, 100d, got '{}'",
                other
            )),
        }
    }
}

/// Raw search input as supplied by a caller, before defaults and
/// normalization are applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub time_window: Option<TimeWindow>,
    pub sources: Vec<String>,
    pub result_count: Option<u32>,
}

/// Validated, canonical search criteria
///
/// Sources are held in a sorted set, so two criteria that differ only in
/// source order are equal and fingerprint identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub time_window: TimeWindow,
    pub sources: BTreeSet<String>,
    pub result_count: u32,
}

fn source_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]{2,21}$").expect("static source pattern"))
}

impl SearchCriteria {
    pub fn new<I, S>(time_window: TimeWindow, sources: I, result_count: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            time_window,
            sources: sources.into_iter().map(Into::into).collect(),
            result_count,
        }
    }

    /// Build criteria from a caller request, filling omitted fields from
    /// configuration defaults and normalizing source names
    pub fn from_request(request: SearchRequest, config: &SearchConfig) -> Result<Self, SearchError> {
        let mut sources = BTreeSet::new();
        for raw in &request.sources {
            let name = raw.trim();
            let name = name
                .strip_prefix("r/")
                .or_else(|| name.strip_prefix("/r/"))
                .unwrap_or(name);

            if !source_name_pattern().is_match(name) {
                return Err(SearchError::Validation(format!(
                    "Invalid source name '{}'",
                    raw
                )));
            }
            sources.insert(name.to_string());
        }

        if sources.len() > config.max_sources {
            return Err(SearchError::Validation(format!(
                "At most {} sources may be searched at once, got {}",
                config.max_sources,
                sources.len()
            )));
        }

        let criteria = Self {
            time_window: request.time_window.unwrap_or(config.default_time_window),
            sources,
            result_count: request.result_count.unwrap_or(config.default_result_count),
        };
        criteria.validate(config.max_result_count)?;

        Ok(criteria)
    }

    /// Check the invariants every criteria must satisfy before any I/O
    pub fn validate(&self, max_result_count: u32) -> Result<(), SearchError> {
        if self.sources.is_empty() {
            return Err(SearchError::Validation(
                "At least one source is required".to_string(),
            ));
        }

        if self.result_count < 1 || self.result_count > max_result_count {
            return Err(SearchError::Validation(format!(
                "Result count must be between 1 and {}, got {}",
                max_result_count, self.result_count
            )));
        }

        Ok(())
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_criteria(self)
    }
}

/// One candidate item as retrieved from a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub id: String,
    pub title: String,
    pub source_name: String,
    pub permalink: String,
    pub upvote_count: u64,
    pub comment_count: u64,
    pub created_at_epoch_seconds: i64,
    pub author_name: String,
    #[serde(default)]
    pub is_removed: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

impl RawItem {
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.created_at_epoch_seconds, 0).unwrap_or_default()
    }
}

/// A raw item with its computed score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    #[serde(flatten)]
    pub item: RawItem,
    pub score: f64,
}

/// The unit stored in the cache and handed back to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub items: Vec<RankedItem>,
    pub total_found: usize,
    pub criteria_used: SearchCriteria,
    pub execution_time_ms: u64,
}
