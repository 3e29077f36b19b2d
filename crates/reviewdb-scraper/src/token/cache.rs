use reviewdb_core::AppRef;
use tokio::sync::Mutex;

use super::{Token, TokenProvider};
use crate::error::ScraperError;

/// Process-wide token holder shared by every app collection.
///
/// The first caller scrapes a token and everyone after reuses it. When the API
/// rejects a token, the caller hands the rejected value to
/// [`TokenCache::invalidate`]; only a matching cached token is dropped, so
/// concurrent callers that all saw the same 401 trigger a single refresh.
pub struct TokenCache {
    provider: TokenProvider,
    current: Mutex<Option<Token>>,
}

impl TokenCache {
    #[must_use]
    pub fn new(provider: TokenProvider) -> Self {
        Self {
            provider,
            current: Mutex::new(None),
        }
    }

    /// Starts with `token` already cached, skipping the first scrape.
    #[must_use]
    pub fn with_token(provider: TokenProvider, token: Token) -> Self {
        Self {
            provider,
            current: Mutex::new(Some(token)),
        }
    }

    /// Returns the cached token, scraping a fresh one through `app`'s landing
    /// page when the cache is empty.
    ///
    /// The lock is held across the scrape so concurrent callers wait for one
    /// acquisition instead of each hitting the storefront.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::TokenUnavailable`] if acquisition fails.
    pub async fn token(&self, app: &AppRef) -> Result<Token, ScraperError> {
        let mut guard = self.current.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let token = self.provider.get_token(app).await?;
        tracing::debug!(app_id = %app.app_id, token = %token.preview(), "cached new media API token");
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token if it is still `stale`.
    pub async fn invalidate(&self, stale: &Token) {
        let mut guard = self.current.lock().await;
        if guard.as_ref() == Some(stale) {
            tracing::info!(token = %stale.preview(), "invalidating rejected media API token");
            *guard = None;
        }
    }
}
