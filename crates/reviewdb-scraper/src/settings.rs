//! Construction-time settings shared by the token provider and review client.

use std::time::Duration;

use reqwest::{Client, Url};
use reviewdb_core::AppConfig;

use crate::error::ScraperError;
use crate::rate_limit::RetryPolicy;

pub const DEFAULT_STOREFRONT_BASE: &str = "https://apps.apple.com";
pub const DEFAULT_API_BASE: &str = "https://amp-api.apps.apple.com";

/// Largest page the reviews endpoint accepts.
pub const PAGE_SIZE: usize = 20;

/// Everything the scraper needs, passed explicitly at construction.
#[derive(Debug, Clone)]
pub struct ScraperSettings {
    /// Storefront root serving landing pages, e.g. `https://apps.apple.com`.
    pub storefront_base: String,
    /// Media API root serving the reviews endpoint.
    pub api_base: String,
    pub request_timeout_secs: u64,
    /// Browser user agents; one is picked at random per request.
    pub user_agents: Vec<String>,
    /// Fixed pause between consecutive page requests of one app.
    pub page_delay: Duration,
    pub retry: RetryPolicy,
    /// Value of the `l` query parameter (storefront `cn` always uses `zh-Hans-CN`).
    pub locale: String,
    /// Per-app ceiling on yielded reviews.
    pub max_records: usize,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            storefront_base: DEFAULT_STOREFRONT_BASE.to_owned(),
            api_base: DEFAULT_API_BASE.to_owned(),
            request_timeout_secs: 30,
            user_agents: reviewdb_core::config::DEFAULT_USER_AGENTS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            page_delay: Duration::from_millis(500),
            retry: RetryPolicy::default(),
            locale: "en-GB".to_owned(),
            max_records: 100_021,
        }
    }
}

impl ScraperSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            request_timeout_secs: config.scraper_request_timeout_secs,
            user_agents: config.scraper_user_agents.clone(),
            page_delay: Duration::from_millis(config.scraper_page_delay_ms),
            retry: RetryPolicy::new(
                config.scraper_max_retries,
                Duration::from_secs(config.scraper_retry_backoff_base_secs),
            ),
            locale: config.scraper_locale.clone(),
            max_records: config.scraper_max_records,
            ..Self::default()
        }
    }

    /// Points both the storefront and the API at `base` (tests use one mock
    /// server for both).
    #[must_use]
    pub fn with_base_url(mut self, base: &str) -> Self {
        base.clone_into(&mut self.storefront_base);
        base.clone_into(&mut self.api_base);
        self
    }

    /// Picks a user agent at random, or `None` when the list is empty.
    pub(crate) fn pick_user_agent(&self) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        let idx = rand::random_range(0..self.user_agents.len());
        self.user_agents.get(idx).map(String::as_str)
    }

    /// Builds the shared `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the client cannot be constructed.
    pub(crate) fn build_http_client(&self) -> Result<Client, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(client)
    }
}

/// Parses `base` as a URL root that relative paths can be joined onto.
///
/// Normalises to exactly one trailing slash so `Url::join` appends rather
/// than replacing the last path segment.
pub(crate) fn parse_base_url(base: &str) -> Result<Url, ScraperError> {
    let normalised = format!("{}/", base.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| ScraperError::InvalidBaseUrl {
        url: base.to_owned(),
        reason: e.to_string(),
    })
}
