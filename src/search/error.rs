//! Classified errors returned to search callers

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default wait suggested to callers after a rate limit
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Invalid search criteria: {0}")]
    Validation(String),

    #[error("Upstream rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Too many requests upstream, retry in {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Search did not finish within {}ms", budget.as_millis())]
    Timeout { budget: Duration },
}

/// Error category, used by presentation layers to pick a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    RateLimited,
    UpstreamUnavailable,
    Network,
    Timeout,
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::Validation(_) => ErrorKind::Validation,
            SearchError::Unauthorized(_) => ErrorKind::Unauthorized,
            SearchError::RateLimited { .. } => ErrorKind::RateLimited,
            SearchError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            SearchError::Network(_) => ErrorKind::Network,
            SearchError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Whether re-running the same criteria may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SearchError::Validation(_) | SearchError::Unauthorized(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SearchError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(!SearchError::Validation("bad".into()).is_retryable());
        assert!(!SearchError::Unauthorized("denied".into()).is_retryable());
        assert!(SearchError::Network("reset".into()).is_retryable());
        assert!(SearchError::UpstreamUnavailable("503".into()).is_retryable());
        assert!(SearchError::Timeout {
            budget: Duration::from_secs(30)
        }
        .is_retryable());
    }

    #[test]
    fn test_rate_limit_retry_after() {
        let err = SearchError::RateLimited {
            retry_after: DEFAULT_RETRY_AFTER,
        };
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
        assert!(err.is_retryable());
        assert_eq!(SearchError::Network("x".into()).retry_after(), None);
    }
}
