//! Configuration management for viralscan
//!
//! Configuration is loaded from a TOML file, overridden from the environment
//! and validated before any component is built from it.

use crate::error::{Result, ViralscanError};
use crate::search::TimeWindow;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub search: SearchConfig,
    pub scoring: ScoringConfig,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub reddit: RedditConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Request defaults and bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Window used when the caller omits one
    pub default_time_window: TimeWindow,
    pub default_result_count: u32,
    pub max_result_count: u32,
    /// Upper bound on the number of sources in one request
    pub max_sources: usize,
}

/// Eligibility thresholds applied before ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub min_upvotes: u64,
    pub min_comments: u64,
    /// Titles must be strictly longer than this many characters
    pub min_title_length: usize,
}

/// Result cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl: String,
}

/// Fan-out and trigger timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Budget for the whole multi-source fetch
    pub overall_timeout: String,
    /// Minimum number of candidates requested per source
    pub per_source_floor: u32,
    pub debounce_window: String,
}

/// Reddit collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    pub user_agent: String,
    pub client_id_env: String,
    pub client_secret_env: String,
    pub auth_url: String,
    pub api_url: String,
    pub request_timeout: String,
}

impl CacheConfig {
    pub fn ttl(&self) -> Result<Duration> {
        parse_duration(&self.ttl).ok_or_else(|| invalid("cache.ttl", &self.ttl))
    }
}

impl FetchConfig {
    pub fn overall_timeout(&self) -> Result<Duration> {
        parse_duration(&self.overall_timeout)
            .ok_or_else(|| invalid("fetch.overall_timeout", &self.overall_timeout))
    }

    pub fn debounce_window(&self) -> Result<Duration> {
        parse_duration(&self.debounce_window)
            .ok_or_else(|| invalid("fetch.debounce_window", &self.debounce_window))
    }
}

impl RedditConfig {
    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration(&self.request_timeout)
            .ok_or_else(|| invalid("reddit.request_timeout", &self.request_timeout))
    }
}

fn invalid(path: &str, value: &str) -> ViralscanError {
    ViralscanError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Invalid duration format: {}", value),
    }
}

/// Parse a duration string such as `"300ms"`, `"30s"`, `"5m"` or `"1h"`.
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits.parse().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ViralscanError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ViralscanError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ViralscanError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: VIRALSCAN_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("VIRALSCAN_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "SEARCH__DEFAULT_TIME_WINDOW" => {
                self.search.default_time_window =
                    value
                        .parse()
                        .map_err(|e: String| ViralscanError::InvalidConfigValue {
                            path: path.to_string(),
                            message: e,
                        })?;
            }
            "SEARCH__DEFAULT_RESULT_COUNT" => {
                self.search.default_result_count = parse_number(path, value)?;
            }
            "CACHE__MAX_SIZE" => {
                self.cache.max_size = parse_number(path, value)?;
            }
            "CACHE__TTL" => {
                self.cache.ttl = value.to_string();
            }
            "FETCH__OVERALL_TIMEOUT" => {
                self.fetch.overall_timeout = value.to_string();
            }
            "REDDIT__USER_AGENT" => {
                self.reddit.user_agent = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ViralscanError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("viralscan").join("config.toml"))
    }
}

fn parse_number<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ViralscanError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}' as a number", value),
        })
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_time_window: TimeWindow::Day,
            default_result_count: 20,
            max_result_count: 100,
            max_sources: 10,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_upvotes: 10,
            min_comments: 5,
            min_title_length: 10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            ttl: "5m".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            overall_timeout: "30s".to_string(),
            per_source_floor: 25,
            debounce_window: "300ms".to_string(),
        }
    }
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: "viralscan/0.1".to_string(),
            client_id_env: "REDDIT_CLIENT_ID".to_string(),
            client_secret_env: "REDDIT_CLIENT_SECRET".to_string(),
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            api_url: "https://oauth.reddit.com".to_string(),
            request_timeout: "30s".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            search: SearchConfig::default(),
            scoring: ScoringConfig::default(),
            cache: CacheConfig::default(),
            fetch: FetchConfig::default(),
            reddit: RedditConfig::default(),
        }
    }
}
