//! Cursor walk over one app's reviews.

use futures::stream::{self, Stream, TryStreamExt};
use reviewdb_core::{AppRef, Review};

use crate::error::ScraperError;
use crate::pagination::FIRST_CURSOR;
use crate::settings::PAGE_SIZE;
use crate::token::TokenCache;
use crate::types::ReviewPage;

use super::{PageOutcome, ReviewClient};

/// Lazy, finite, single-pass walk over an app's reviews.
///
/// Pages are requested strictly in order, one at a time, with the configured
/// page delay between consecutive requests. The walk ends on a page without a
/// `next` link, on HTTP 404, or once `max_records` reviews have been yielded.
/// After an error the pager keeps the failing cursor so callers can report it
/// and resume a later run with [`ReviewPager::resume_from`].
pub struct ReviewPager<'a> {
    client: &'a ReviewClient,
    tokens: &'a TokenCache,
    app: AppRef,
    cursor: Option<String>,
    max_records: usize,
    yielded: usize,
    pages_requested: usize,
}

impl<'a> ReviewPager<'a> {
    #[must_use]
    pub fn new(client: &'a ReviewClient, tokens: &'a TokenCache, app: AppRef) -> Self {
        Self {
            client,
            tokens,
            app,
            cursor: Some(FIRST_CURSOR.to_owned()),
            max_records: client.settings().max_records,
            yielded: 0,
            pages_requested: 0,
        }
    }

    /// Starts the walk at `cursor` instead of the first page.
    #[must_use]
    pub fn resume_from(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    #[must_use]
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    #[must_use]
    pub fn app(&self) -> &AppRef {
        &self.app
    }

    /// Cursor of the next page to request, or of the page that just failed.
    /// `None` once the walk is finished.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Reviews yielded so far.
    #[must_use]
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Fetches the next page, or `Ok(None)` once the walk is over.
    ///
    /// A 401/403 invalidates the shared token, acquires a fresh one, and
    /// re-issues the same cursor once. A second auth failure is returned.
    ///
    /// # Errors
    ///
    /// - Any error from [`ReviewClient::fetch_page`] or [`TokenCache::token`].
    /// - [`ScraperError::CursorCycle`] if the server points back at the cursor
    ///   it was just asked for.
    pub async fn next_page(&mut self) -> Result<Option<ReviewPage>, ScraperError> {
        if self.yielded >= self.max_records {
            self.cursor = None;
        }
        let Some(cursor) = self.cursor.clone() else {
            return Ok(None);
        };

        let page_delay = self.client.settings().page_delay;
        if self.pages_requested > 0 && !page_delay.is_zero() {
            tokio::time::sleep(page_delay).await;
        }
        self.pages_requested += 1;

        let token = self.tokens.token(&self.app).await?;
        let outcome = match self.client.fetch_page(&self.app, &token, &cursor).await {
            Err(ScraperError::Unauthorized { status, .. }) => {
                tracing::warn!(
                    app_id = %self.app.app_id,
                    cursor = %cursor,
                    status,
                    "media API token rejected; refreshing once"
                );
                self.tokens.invalidate(&token).await;
                let fresh = self.tokens.token(&self.app).await?;
                self.client.fetch_page(&self.app, &fresh, &cursor).await?
            }
            other => other?,
        };

        let mut page = match outcome {
            PageOutcome::EndOfStream => {
                tracing::info!(
                    app_id = %self.app.app_id,
                    cursor = %cursor,
                    yielded = self.yielded,
                    "no more reviews"
                );
                self.cursor = None;
                return Ok(None);
            }
            PageOutcome::Page(page) => page,
        };

        if page.next_cursor.as_deref() == Some(cursor.as_str()) {
            return Err(ScraperError::CursorCycle {
                app_id: self.app.app_id.clone(),
                cursor,
            });
        }

        if page.reviews.len() < PAGE_SIZE && page.next_cursor.is_some() {
            tracing::warn!(
                app_id = %self.app.app_id,
                cursor = %cursor,
                count = page.reviews.len(),
                "short review page before end of stream"
            );
        }

        let remaining = self.max_records - self.yielded;
        if page.reviews.len() >= remaining {
            page.reviews.truncate(remaining);
            page.next_cursor = None;
        }

        self.yielded += page.reviews.len();
        self.cursor.clone_from(&page.next_cursor);

        tracing::debug!(
            app_id = %self.app.app_id,
            cursor = %cursor,
            count = page.reviews.len(),
            next = ?page.next_cursor,
            "fetched review page"
        );
        Ok(Some(page))
    }

    /// Flattens the remaining pages into a stream of reviews. The stream ends
    /// after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Review, ScraperError>> + 'a {
        stream::try_unfold(self, |mut pager| async move {
            let page = pager.next_page().await?;
            Ok::<_, ScraperError>(page.map(|page| {
                let reviews = stream::iter(page.reviews.into_iter().map(Ok::<_, ScraperError>));
                (reviews, pager)
            }))
        })
        .try_flatten()
    }
}
