//! Concurrent multi-source retrieval with partial-failure tolerance

use crate::search::{RawItem, SearchError, TimeWindow};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure of a single source retrieval
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Network failure: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceErrorKind {
    Unauthorized,
    RateLimited,
    UpstreamUnavailable,
    Network,
}

impl SourceErrorKind {
    /// Ordering used to pick one error when every source failed
    fn severity(self) -> u8 {
        match self {
            SourceErrorKind::Unauthorized => 3,
            SourceErrorKind::RateLimited => 2,
            SourceErrorKind::UpstreamUnavailable => 1,
            SourceErrorKind::Network => 0,
        }
    }
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceErrorKind::Unauthorized => "unauthorized",
            SourceErrorKind::RateLimited => "rate-limited",
            SourceErrorKind::UpstreamUnavailable => "upstream-unavailable",
            SourceErrorKind::Network => "network",
        };
        f.write_str(name)
    }
}

impl SourceError {
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            SourceError::Unauthorized(_) => SourceErrorKind::Unauthorized,
            SourceError::RateLimited { .. } => SourceErrorKind::RateLimited,
            SourceError::UpstreamUnavailable(_) => SourceErrorKind::UpstreamUnavailable,
            SourceError::Network(_) => SourceErrorKind::Network,
        }
    }
}

impl From<SourceError> for SearchError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unauthorized(msg) => SearchError::Unauthorized(msg),
            SourceError::RateLimited { retry_after } => SearchError::RateLimited { retry_after },
            SourceError::UpstreamUnavailable(msg) => SearchError::UpstreamUnavailable(msg),
            SourceError::Network(msg) => SearchError::Network(msg),
        }
    }
}

/// Retrieves candidate items from one named source
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch(
        &self,
        source: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<RawItem>, SourceError>;
}

/// Settled result of one per-source task
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Fetched { source: String, items: Vec<RawItem> },
    Failed { source: String, error: SourceError },
}

#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: String,
    pub error: SourceError,
}

/// Aggregate of every settled per-source outcome
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Items from every successful source, concatenated in source order
    pub items: Vec<RawItem>,
    pub failures: Vec<SourceFailure>,
    pub succeeded: usize,
}

impl FetchReport {
    /// Keep fulfilled results and record failures
    pub fn collect(outcomes: impl IntoIterator<Item = SourceOutcome>) -> Self {
        outcomes
            .into_iter()
            .fold(FetchReport::default(), |mut report, outcome| {
                match outcome {
                    SourceOutcome::Fetched { items, .. } => {
                        report.items.extend(items);
                        report.succeeded += 1;
                    }
                    SourceOutcome::Failed { source, error } => {
                        report.failures.push(SourceFailure { source, error });
                    }
                }
                report
            })
    }

    /// The aggregated items, or the most severe failure if no source
    /// succeeded
    pub fn into_items(self) -> Result<Vec<RawItem>, SearchError> {
        if self.succeeded > 0 || self.failures.is_empty() {
            return Ok(self.items);
        }

        let worst = self
            .failures
            .into_iter()
            .max_by_key(|failure| failure.error.kind().severity())
            .map(|failure| failure.error);

        match worst {
            Some(error) => Err(error.into()),
            None => Ok(Vec::new()),
        }
    }
}

/// Fans a search out to every source and joins the results
pub struct SourceFetcher {
    client: Arc<dyn SourceClient>,
    overall_timeout: Duration,
}

impl SourceFetcher {
    pub fn new(client: Arc<dyn SourceClient>, overall_timeout: Duration) -> Self {
        Self {
            client,
            overall_timeout,
        }
    }

    pub fn overall_timeout(&self) -> Duration {
        self.overall_timeout
    }

    /// Fetch from every source concurrently and wait for all to settle.
    ///
    /// Individual failures are recorded in the report. If the whole join
    /// exceeds the budget, the outstanding requests are dropped and the
    /// operation fails with `SearchError::Timeout`; nothing partial is
    /// returned.
    pub async fn fetch_all(
        &self,
        sources: &BTreeSet<String>,
        window: TimeWindow,
        limit: u32,
    ) -> Result<FetchReport, SearchError> {
        let tasks = sources.iter().map(|source| {
            let client = self.client.clone();
            async move {
                match client.fetch(source, window, limit).await {
                    Ok(items) => {
                        debug!("Fetched {} items from {}", items.len(), source);
                        SourceOutcome::Fetched {
                            source: source.clone(),
                            items,
                        }
                    }
                    Err(error) => {
                        warn!("Failed to fetch from {}: {}", source, error);
                        SourceOutcome::Failed {
                            source: source.clone(),
                            error,
                        }
                    }
                }
            }
        });

        let outcomes = tokio::time::timeout(self.overall_timeout, join_all(tasks))
            .await
            .map_err(|_| {
                warn!(
                    "Fetch across {} sources exceeded {:?}",
                    sources.len(),
                    self.overall_timeout
                );
                SearchError::Timeout {
                    budget: self.overall_timeout,
                }
            })?;

        let report = FetchReport::collect(outcomes);
        info!(
            "Fetched {} items from {}/{} sources",
            report.items.len(),
            report.succeeded,
            sources.len()
        );

        Ok(report)
    }
}
