//! Application settings
//!
//! Settings are read from an optional YAML file and then overridden from the
//! environment. Every field has a default, so an empty file (or no file) is a
//! valid configuration for anonymous REST access.
//!
//! ```yaml
//! app_name: Stargazer
//! environment: prod
//! github_account: octocat
//! github_token: ghp_xxx
//! api:
//!   flavor: graphql
//! fetch:
//!   page_size: 100
//!   max_attempts: 5
//!   request_interval_ms: 1000
//! backoff:
//!   type: exponential
//!   initial_ms: 1000
//!   max_ms: 60000
//! cache:
//!   enabled: true
//!   ttl_seconds: 300
//! ```

use crate::error::{Error, Result, ResultExt};
use crate::http::HttpClientConfig;
use crate::rate::Backoff;
use crate::types::{ApiFlavor, BackoffType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the GitHub token
pub const TOKEN_ENV: &str = "STARGAZER_TOKEN";
/// Fallback environment variable for the GitHub token
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
/// Environment variable naming the deployment environment
pub const ENVIRONMENT_ENV: &str = "STARGAZER_ENVIRONMENT";
/// Environment variable naming the GitHub account reported by `/info`
pub const GITHUB_ACCOUNT_ENV: &str = "STARGAZER_GITHUB_ACCOUNT";
/// Environment variable overriding the REST base URL
pub const API_URL_ENV: &str = "STARGAZER_API_URL";
/// Environment variable overriding the GraphQL endpoint
pub const GRAPHQL_URL_ENV: &str = "STARGAZER_GRAPHQL_URL";

/// Largest page the listing APIs serve
pub const MAX_PAGE_SIZE: u8 = 100;

// ============================================================================
// Top-Level Settings
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Application name reported by `/info`
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Deployment environment (dev, prod, ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Contact address reported by `/info`
    #[serde(default = "default_admin_email")]
    pub admin_email: String,

    /// GitHub account the token belongs to, reported by `/info`
    #[serde(default)]
    pub github_account: String,

    /// GitHub token; empty means anonymous
    #[serde(default)]
    pub github_token: String,

    /// Upstream API settings
    #[serde(default)]
    pub api: ApiSettings,

    /// Pagination settings
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Retry settings
    #[serde(default)]
    pub backoff: BackoffSettings,

    /// Page cache settings
    #[serde(default)]
    pub cache: CacheSettings,
}

fn default_app_name() -> String {
    "Stargazer".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_admin_email() -> String {
    "admin@example.com".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
            admin_email: default_admin_email(),
            github_account: String::new(),
            github_token: String::new(),
            api: ApiSettings::default(),
            fetch: FetchSettings::default(),
            backoff: BackoffSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

// ============================================================================
// API Settings
// ============================================================================

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// REST base URL
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,

    /// GraphQL endpoint
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// Which API to page through
    #[serde(default)]
    pub flavor: ApiFlavor,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            rest_base_url: default_rest_base_url(),
            graphql_url: default_graphql_url(),
            flavor: ApiFlavor::default(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_rest_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_graphql_url() -> String {
    "https://api.github.com/graphql".to_string()
}

fn default_user_agent() -> String {
    format!("stargazer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

// ============================================================================
// Fetch Settings
// ============================================================================

/// Pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Items per page (1..=100)
    #[serde(default = "default_page_size")]
    pub page_size: u8,

    /// Total calls allowed for one page
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Minimum spacing between requests on one credential; 0 disables
    #[serde(default = "default_request_interval")]
    pub request_interval_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_attempts: default_max_attempts(),
            request_interval_ms: default_request_interval(),
        }
    }
}

fn default_page_size() -> u8 {
    MAX_PAGE_SIZE
}

fn default_max_attempts() -> u32 {
    5
}

fn default_request_interval() -> u64 {
    1000
}

// ============================================================================
// Backoff Settings
// ============================================================================

/// Retry delay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSettings {
    /// Backoff type
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,

    /// Random fraction shaved off each delay (0..=0.5)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::default(),
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_initial_ms() -> u64 {
    1000
}

fn default_max_ms() -> u64 {
    60_000
}

fn default_jitter() -> f64 {
    0.1
}

// ============================================================================
// Cache Settings
// ============================================================================

/// Page cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Whether fetched pages are cached in memory
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry lifetime in seconds; 0 keeps entries until restart
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300
}

// ============================================================================
// Loading
// ============================================================================

impl Settings {
    /// Parse settings from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    /// Load settings: file (when given), then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|name| std::env::var(name).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup (the process environment in [`Settings::load`])
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(TOKEN_ENV).or_else(|| non_empty(GITHUB_TOKEN_ENV)) {
            self.github_token = token;
        }
        if let Some(environment) = non_empty(ENVIRONMENT_ENV) {
            self.environment = environment;
        }
        if let Some(account) = non_empty(GITHUB_ACCOUNT_ENV) {
            self.github_account = account;
        }
        if let Some(url) = non_empty(API_URL_ENV) {
            self.api.rest_base_url = url;
        }
        if let Some(url) = non_empty(GRAPHQL_URL_ENV) {
            self.api.graphql_url = url;
        }
    }

    /// Reject values the fetch pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.fetch.page_size == 0 || self.fetch.page_size > MAX_PAGE_SIZE {
            return Err(Error::invalid_value(
                "fetch.page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        if self.fetch.max_attempts == 0 {
            return Err(Error::invalid_value("fetch.max_attempts", "must be at least 1"));
        }
        if self.backoff.max_ms < self.backoff.initial_ms {
            return Err(Error::invalid_value(
                "backoff.max_ms",
                "must not be smaller than backoff.initial_ms",
            ));
        }
        if !(0.0..=0.5).contains(&self.backoff.jitter) {
            return Err(Error::invalid_value("backoff.jitter", "must be between 0 and 0.5"));
        }
        if self.api.timeout_seconds == 0 {
            return Err(Error::invalid_value("api.timeout_seconds", "must be positive"));
        }
        url::Url::parse(&self.api.rest_base_url)?;
        url::Url::parse(&self.api.graphql_url)?;
        Ok(())
    }

    /// Copy with the token masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.github_token.is_empty() {
            copy.github_token = "***".to_string();
        }
        copy
    }

    /// HTTP client configuration for the REST API
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig::builder()
            .base_url(self.api.rest_base_url.clone())
            .timeout(Duration::from_secs(self.api.timeout_seconds))
            .connect_timeout(Duration::from_secs(self.api.connect_timeout_seconds))
            .user_agent(self.api.user_agent.clone())
            .build()
    }

    /// Retry policy
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.backoff.backoff_type,
            Duration::from_millis(self.backoff.initial_ms),
            Duration::from_millis(self.backoff.max_ms),
        )
        .with_jitter(self.backoff.jitter)
        .with_max_attempts(self.fetch.max_attempts)
    }

    /// Minimum request spacing
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.fetch.request_interval_ms)
    }

    /// Cache lifetime, `None` when entries never expire
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache.ttl_seconds > 0).then(|| Duration::from_secs(self.cache.ttl_seconds))
    }
}
