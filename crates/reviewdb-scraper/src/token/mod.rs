//! Bearer token acquisition for the App Store media API.
//!
//! The token is not issued through any documented flow. Every storefront page
//! embeds it in a `<meta name="web-experience-app/config/environment">` tag
//! whose `content` is URL-encoded JSON with the token under
//! `MEDIA_API.token`. The token is cut out with a fixed pattern on the encoded
//! text instead of decoding and parsing the JSON, so truncated or slightly
//! malformed markup still yields it.

mod cache;

use std::sync::LazyLock;

use regex::Regex;
use reqwest::{Client, Url};
use reviewdb_core::AppRef;

use crate::error::ScraperError;
use crate::settings::{parse_base_url, ScraperSettings};

pub use cache::TokenCache;

/// Pages known to carry the config tag, tried in order when the app's own
/// landing page yields nothing.
pub const FALLBACK_TOKEN_PATHS: [&str; 3] = [
    "404",
    "story/id1538632801",
    "us/app/facebook/id284882215",
];

static CONFIG_META_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*<meta.+web-experience-app/config/environment").expect("valid meta regex")
});

static ENCODED_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"token%22%3A%22(.+?)%22").expect("valid token regex"));

/// Opaque media API credential. Its expiry is unknown; a 401/403 from the
/// API is the only signal that it went stale.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First few characters, for logs and CLI output.
    #[must_use]
    pub fn preview(&self) -> String {
        let head: String = self.0.chars().take(10).collect();
        format!("{head}…")
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Token").field(&"[redacted]").finish()
    }
}

/// Scans `html` line by line and returns the token from the first config
/// meta line that carries one.
#[must_use]
pub fn extract_token(html: &str) -> Option<Token> {
    html.lines()
        .filter(|line| CONFIG_META_LINE.is_match(line))
        .find_map(|line| ENCODED_TOKEN.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| Token::new(m.as_str()))
}

/// Scrapes bearer tokens from storefront landing pages. Holds no cache; see
/// [`TokenCache`] for reuse across requests.
pub struct TokenProvider {
    client: Client,
    storefront: Url,
    settings: ScraperSettings,
}

impl TokenProvider {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built, or
    /// [`ScraperError::InvalidBaseUrl`] if the storefront base does not parse.
    pub fn new(settings: &ScraperSettings) -> Result<Self, ScraperError> {
        Ok(Self {
            client: settings.build_http_client()?,
            storefront: parse_base_url(&settings.storefront_base)?,
            settings: settings.clone(),
        })
    }

    /// Acquires a token for `app`.
    ///
    /// Tries the app's landing page first, then each of
    /// [`FALLBACK_TOKEN_PATHS`]. A page that fails to load or carries no token
    /// moves on to the next one; nothing is retried with backoff.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::TokenUnavailable`] when no page yields a token.
    pub async fn get_token(&self, app: &AppRef) -> Result<Token, ScraperError> {
        let candidates: Vec<String> = std::iter::once(app.landing_path())
            .chain(FALLBACK_TOKEN_PATHS.iter().map(|p| (*p).to_owned()))
            .collect();

        for (idx, path) in candidates.iter().enumerate() {
            let Ok(url) = self.storefront.join(path) else {
                tracing::warn!(path = %path, "skipping unjoinable token page path");
                continue;
            };

            match self.scrape_page(&url).await {
                Ok(Some(token)) => {
                    if idx > 0 {
                        tracing::info!(
                            app_id = %app.app_id,
                            page = %url,
                            "token acquired from fallback page"
                        );
                    }
                    return Ok(token);
                }
                Ok(None) => {
                    tracing::debug!(app_id = %app.app_id, page = %url, "no token on page");
                }
                Err(e) => {
                    tracing::warn!(
                        app_id = %app.app_id,
                        page = %url,
                        error = %e,
                        "token page request failed"
                    );
                }
            }
        }

        Err(ScraperError::TokenUnavailable {
            app_id: app.app_id.clone(),
            attempted: candidates.len(),
        })
    }

    async fn scrape_page(&self, url: &Url) -> Result<Option<Token>, ScraperError> {
        let mut request = self.client.get(url.clone()).header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
        );
        if let Some(ua) = self.settings.pick_user_agent() {
            request = request.header(reqwest::header::USER_AGENT, ua);
        }

        let html = request.send().await?.error_for_status()?.text().await?;
        Ok(extract_token(&html))
    }
}
