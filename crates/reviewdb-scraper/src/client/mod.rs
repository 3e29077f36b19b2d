//! HTTP client for the App Store media API reviews endpoint.

mod pager;

use reqwest::{Client, StatusCode, Url};
use reviewdb_core::{AppRef, Review};

use crate::error::ScraperError;
use crate::pagination::extract_next_cursor;
use crate::settings::{parse_base_url, ScraperSettings, PAGE_SIZE};
use crate::token::{Token, TokenCache};
use crate::types::{ReviewPage, ReviewsResponse};

pub use pager::ReviewPager;

/// Locale the `cn` storefront requires regardless of configuration.
const CHINA_LOCALE: &str = "zh-Hans-CN";

const ADDITIONAL_PLATFORMS: &str = "appletv,ipad,iphone,mac";

/// Result of a single page request.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Page(ReviewPage),
    /// HTTP 404: the app has no (more) reviews at this cursor.
    EndOfStream,
}

/// Reviews endpoint client.
///
/// Rate limiting (429) is retried through the configured
/// [`crate::RetryPolicy`] at the same cursor. 404 ends pagination. 401/403
/// surface as [`ScraperError::Unauthorized`] so the pager can refresh the
/// token. Any other non-2xx status is fatal for the app.
pub struct ReviewClient {
    client: Client,
    storefront: Url,
    api: Url,
    settings: ScraperSettings,
}

impl ReviewClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ScraperError::InvalidBaseUrl`] if either
    /// base URL does not parse.
    pub fn new(settings: ScraperSettings) -> Result<Self, ScraperError> {
        Ok(Self {
            client: settings.build_http_client()?,
            storefront: parse_base_url(&settings.storefront_base)?,
            api: parse_base_url(&settings.api_base)?,
            settings,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &ScraperSettings {
        &self.settings
    }

    /// Value of the `l` query parameter for `country`.
    #[must_use]
    pub fn locale_for<'a>(&'a self, country: &str) -> &'a str {
        if country.eq_ignore_ascii_case("cn") {
            CHINA_LOCALE
        } else {
            &self.settings.locale
        }
    }

    /// The app's storefront landing page, sent as `Referer`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidBaseUrl`] if the path cannot be joined.
    pub fn landing_url(&self, app: &AppRef) -> Result<Url, ScraperError> {
        self.storefront
            .join(&app.landing_path())
            .map_err(|e| ScraperError::InvalidBaseUrl {
                url: self.storefront.to_string(),
                reason: e.to_string(),
            })
    }

    /// Builds the reviews URL for `app` at `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidBaseUrl`] if the path cannot be joined.
    pub fn reviews_url(&self, app: &AppRef, cursor: &str) -> Result<Url, ScraperError> {
        let path = format!("v1/catalog/{}/apps/{}/reviews", app.country, app.app_id);
        let mut url = self
            .api
            .join(&path)
            .map_err(|e| ScraperError::InvalidBaseUrl {
                url: self.api.to_string(),
                reason: e.to_string(),
            })?;

        url.query_pairs_mut()
            .append_pair("l", self.locale_for(&app.country))
            .append_pair("offset", cursor)
            .append_pair("limit", &PAGE_SIZE.to_string())
            .append_pair("platform", "web")
            .append_pair("additionalPlatforms", ADDITIONAL_PLATFORMS);
        Ok(url)
    }

    /// Fetches one page of reviews for `app` at `cursor`.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimitExhausted`] if 429 persists past the retry budget.
    /// - [`ScraperError::Unauthorized`] on 401/403 (not retried here).
    /// - [`ScraperError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`ScraperError::Http`] on transport failure (not retried).
    /// - [`ScraperError::Deserialize`] if the body does not match the expected shape.
    /// - [`ScraperError::InvalidReview`] if a review carries an unusable rating or author.
    pub async fn fetch_page(
        &self,
        app: &AppRef,
        token: &Token,
        cursor: &str,
    ) -> Result<PageOutcome, ScraperError> {
        let url = self.reviews_url(app, cursor)?;
        let referer = self.landing_url(app)?;
        let origin = self.storefront.origin().ascii_serialization();
        let context = format!("app {} offset {cursor}", app.app_id);

        self.settings
            .retry
            .run(|| {
                let url = url.clone();
                let referer = referer.clone();
                let origin = origin.clone();
                let context = context.clone();
                async move {
                    let mut request = self
                        .client
                        .get(url.clone())
                        .header(reqwest::header::ACCEPT, "application/json")
                        .header(
                            reqwest::header::AUTHORIZATION,
                            format!("bearer {}", token.as_str()),
                        )
                        .header(reqwest::header::ORIGIN, origin)
                        .header(reqwest::header::REFERER, referer.as_str());
                    if let Some(ua) = self.settings.pick_user_agent() {
                        request = request.header(reqwest::header::USER_AGENT, ua);
                    }

                    let response = request.send().await?;
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        return Err(ScraperError::RateLimited { context });
                    }
                    if status == StatusCode::NOT_FOUND {
                        tracing::debug!(app_id = %app.app_id, cursor, "reviews endpoint returned 404");
                        return Ok(PageOutcome::EndOfStream);
                    }
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(ScraperError::Unauthorized {
                            status: status.as_u16(),
                            context,
                        });
                    }
                    if !status.is_success() {
                        return Err(ScraperError::UnexpectedStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }

                    let body = response.text().await?;
                    let parsed: ReviewsResponse =
                        serde_json::from_str(&body).map_err(|source| {
                            ScraperError::Deserialize {
                                context: context.clone(),
                                source,
                            }
                        })?;

                    let next_cursor = extract_next_cursor(parsed.next.as_deref());
                    let reviews = parsed
                        .data
                        .into_iter()
                        .map(|resource| resource.into_review(app))
                        .collect::<Result<Vec<Review>, String>>()
                        .map_err(|reason| ScraperError::InvalidReview {
                            context: context.clone(),
                            reason,
                        })?;

                    Ok(PageOutcome::Page(ReviewPage {
                        cursor: cursor.to_owned(),
                        reviews,
                        next_cursor,
                    }))
                }
            })
            .await
    }

    /// Starts a pager over `app` using the configured `max_records`.
    #[must_use]
    pub fn pager<'a>(&'a self, tokens: &'a TokenCache, app: AppRef) -> ReviewPager<'a> {
        ReviewPager::new(self, tokens, app)
    }

    /// Fetches every review of `app`, up to `max_records`.
    ///
    /// **All-or-nothing**: on any page failure the reviews collected so far are
    /// discarded and the error is returned. Callers that need per-page progress
    /// drive a [`ReviewPager`] directly.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`ReviewPager::next_page`].
    pub async fn fetch_all_reviews(
        &self,
        tokens: &TokenCache,
        app: AppRef,
        max_records: usize,
    ) -> Result<Vec<Review>, ScraperError> {
        let mut pager = self.pager(tokens, app).with_max_records(max_records);
        let mut all_reviews = Vec::new();
        while let Some(page) = pager.next_page().await? {
            all_reviews.extend(page.reviews);
        }
        Ok(all_reviews)
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
