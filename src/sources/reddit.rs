//! Reddit listing client
//!
//! Authenticates once with the client-credentials flow, then reads the
//! `top` listing of each subreddit. Errors are classified for the fetcher;
//! nothing is retried here.

use crate::config::RedditConfig;
use crate::error::{Result, ViralscanError};
use crate::search::{RawItem, SourceClient, SourceError, TimeWindow, DEFAULT_RETRY_AFTER};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const DELETED: &str = "[deleted]";

pub struct RedditClient {
    http: reqwest::Client,
    auth_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct Listing {
    data: Option<ListingData>,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    title: String,
    subreddit: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    created_utc: f64,
    author: Option<String>,
    selftext: Option<String>,
    removed_by_category: Option<serde_json::Value>,
}

impl RedditClient {
    /// Build a client, reading credentials from the environment variables
    /// named in the configuration
    pub fn from_env(config: &RedditConfig) -> Result<Self> {
        let client_id = read_env(&config.client_id_env)?;
        let client_secret = read_env(&config.client_secret_env)?;
        Self::with_credentials(config, client_id, client_secret)
    }

    pub fn with_credentials(
        config: &RedditConfig,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout()?)
            .build()?;

        Ok(Self {
            http,
            auth_url: config.auth_url.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: RwLock::new(None),
        })
    }

    async fn access_token(&self) -> std::result::Result<String, SourceError> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }

        let token = self.authenticate().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    async fn authenticate(&self) -> std::result::Result<String, SourceError> {
        let response = self
            .http
            .post(&self.auth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(match classify_status(status, response.headers()) {
                SourceError::RateLimited { retry_after } => SourceError::RateLimited { retry_after },
                SourceError::UpstreamUnavailable(msg) if status.is_server_error() => {
                    SourceError::UpstreamUnavailable(msg)
                }
                _ => SourceError::Unauthorized(format!("Reddit authentication failed: {}", status)),
            });
        }

        let body: TokenResponse = response.json().await.map_err(transport_error)?;
        let token = body.access_token.ok_or_else(|| {
            SourceError::Unauthorized("Reddit authentication returned no access token".to_string())
        })?;

        info!("Authenticated with Reddit API");
        Ok(token)
    }
}

#[async_trait]
impl SourceClient for RedditClient {
    async fn fetch(
        &self,
        source: &str,
        window: TimeWindow,
        limit: u32,
    ) -> std::result::Result<Vec<RawItem>, SourceError> {
        let token = self.access_token().await?;
        let url = format!("{}/r/{}/top", self.api_url, source);
        let limit = limit.to_string();

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[("t", reddit_period(window)), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            if status == StatusCode::UNAUTHORIZED {
                // Force a fresh token on the next search
                self.token.write().await.take();
            }
            return Err(classify_status(status, response.headers()));
        }

        let listing: Listing = response.json().await.map_err(transport_error)?;
        let items = parse_listing(listing);
        debug!("Fetched {} posts from r/{}", items.len(), source);

        Ok(items)
    }
}

fn read_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => Err(ViralscanError::Config(format!(
            "Environment variable {} is empty",
            name
        ))),
        Err(_) => Err(ViralscanError::Config(format!(
            "Environment variable {} is not set",
            name
        ))),
    }
}

/// Reddit's `t` parameter for a window. Reddit has no 10- or 100-day
/// period, so those widen to week and all.
pub fn reddit_period(window: TimeWindow) -> &'static str {
    match window {
        TimeWindow::Hour => "hour",
        TimeWindow::Day => "day",
        TimeWindow::TenDays => "week",
        TimeWindow::HundredDays => "all",
    }
}

fn classify_status(status: StatusCode, headers: &HeaderMap) -> SourceError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SourceError::Unauthorized(format!("Access denied: {}", status))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            SourceError::RateLimited { retry_after }
        }
        other => SourceError::UpstreamUnavailable(format!("Reddit API error: {}", other)),
    }
}

fn transport_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Network(format!("Request timed out: {}", err))
    } else {
        SourceError::Network(err.to_string())
    }
}

fn parse_listing(listing: Listing) -> Vec<RawItem> {
    let Some(data) = listing.data else {
        return Vec::new();
    };

    data.children
        .into_iter()
        .filter_map(|child| match serde_json::from_value::<PostData>(child.data) {
            Ok(post) => Some(map_post(post)),
            Err(e) => {
                warn!("Skipping malformed post: {}", e);
                None
            }
        })
        .collect()
}

fn map_post(post: PostData) -> RawItem {
    let is_deleted =
        post.author.as_deref() == Some(DELETED) || post.selftext.as_deref() == Some(DELETED);
    let author = post.author.unwrap_or_else(|| DELETED.to_string());

    RawItem {
        id: post.id,
        title: post.title,
        source_name: post.subreddit,
        permalink: post.permalink,
        upvote_count: post.score.max(0) as u64,
        comment_count: post.num_comments.max(0) as u64,
        created_at_epoch_seconds: post.created_utc as i64,
        author_name: author,
        is_removed: post.removed_by_category.is_some(),
        is_deleted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn listing(children: serde_json::Value) -> Listing {
        serde_json::from_value(json!({ "kind": "Listing", "data": { "children": children } }))
            .unwrap()
    }

    #[test]
    fn test_period_mapping() {
        assert_eq!(reddit_period(TimeWindow::Hour), "hour");
        assert_eq!(reddit_period(TimeWindow::Day), "day");
        assert_eq!(reddit_period(TimeWindow::TenDays), "week");
        assert_eq!(reddit_period(TimeWindow::HundredDays), "all");
    }

    #[test]
    fn test_parse_listing_maps_fields() {
        let items = parse_listing(listing(json!([
            { "kind": "t3", "data": {
                "id": "abc",
                "title": "My landlord did something unbelievable",
                "subreddit": "tifu",
                "permalink": "/r/tifu/comments/abc/",
                "score": 1234,
                "num_comments": 321,
                "created_utc": 1700000000.0,
                "author": "storyteller",
                "selftext": "It started on a Monday",
                "removed_by_category": null
            }}
        ])));

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id, "abc");
        assert_eq!(item.source_name, "tifu");
        assert_eq!(item.upvote_count, 1234);
        assert_eq!(item.comment_count, 321);
        assert_eq!(item.created_at_epoch_seconds, 1_700_000_000);
        assert!(!item.is_removed);
        assert!(!item.is_deleted);
    }

    #[test]
    fn test_parse_listing_flags_and_clamps() {
        let items = parse_listing(listing(json!([
            { "data": {
                "id": "neg", "title": "Downvoted into oblivion", "subreddit": "aa",
                "score": -15, "num_comments": 3, "created_utc": 1.0,
                "author": "x", "removed_by_category": "moderator"
            }},
            { "data": {
                "id": "gone", "title": "Author went away", "subreddit": "aa",
                "score": 10, "num_comments": 3, "created_utc": 1.0,
                "author": "[deleted]"
            }},
            { "data": {
                "id": "body", "title": "Body went away", "subreddit": "aa",
                "score": 10, "num_comments": 3, "created_utc": 1.0,
                "selftext": "[deleted]"
            }}
        ])));

        assert_eq!(items[0].upvote_count, 0);
        assert!(items[0].is_removed);
        assert!(items[1].is_deleted);
        assert!(items[2].is_deleted);
        assert_eq!(items[2].author_name, "[deleted]");
    }

    #[test]
    fn test_missing_author_is_not_deleted() {
        let items = parse_listing(listing(json!([
            { "data": {
                "id": "anon", "title": "Posted without an author field", "subreddit": "aa",
                "score": 10, "num_comments": 3, "created_utc": 1.0,
                "selftext": "still here"
            }}
        ])));

        assert_eq!(items[0].author_name, "[deleted]");
        assert!(!items[0].is_deleted);
    }

    #[test]
    fn test_parse_listing_skips_malformed() {
        let items = parse_listing(listing(json!([
            { "data": { "title": "no id or subreddit" } },
            { "data": { "id": "ok", "title": "Fine post here", "subreddit": "aa" } }
        ])));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "ok");
    }

    #[test]
    fn test_parse_listing_without_data() {
        let empty: Listing = serde_json::from_value(json!({ "kind": "Listing" })).unwrap();
        assert!(parse_listing(empty).is_empty());
    }

    #[test]
    fn test_classify_status() {
        let headers = HeaderMap::new();
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, &headers),
            SourceError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, &headers),
            SourceError::UpstreamUnavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, &headers),
            SourceError::UpstreamUnavailable(_)
        ));
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &headers),
            SourceError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
        );

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &headers),
            SourceError::RateLimited {
                retry_after: Duration::from_secs(12)
            }
        );
    }

    #[test]
    fn test_with_credentials_builds_client() {
        let client =
            RedditClient::with_credentials(&RedditConfig::default(), "id", "secret").unwrap();
        assert_eq!(client.api_url, "https://oauth.reddit.com");
    }
}
