//! Orchestration for a collection run: apps in parallel, pages in order.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reviewdb_core::{AppRef, PersistedRecord};
use reviewdb_db::{BatchCounts, DeduplicatingSink, ReviewStore};
use reviewdb_scraper::{ReviewClient, ScraperSettings, TokenCache, TokenProvider};

/// What to collect and how hard to push.
pub(crate) struct CollectPlan {
    pub apps: Vec<AppRef>,
    pub keyword: Option<String>,
    pub max_records: usize,
    pub max_concurrent: usize,
    pub batch_size: usize,
}

/// Outcome of collecting a single app. Pages persisted before a failure stay
/// persisted, so `Err` carries counts too.
enum AppOutcome {
    Ok {
        fetched: u64,
        counts: BatchCounts,
    },
    Err {
        error: anyhow::Error,
        last_cursor: Option<String>,
        fetched: u64,
        counts: BatchCounts,
    },
}

#[derive(Debug, Default)]
pub(crate) struct CollectionTotals {
    pub fetched: u64,
    pub counts: BatchCounts,
    pub failed_apps: usize,
}

/// Collects every app in `plan`, at most `plan.max_concurrent` at a time.
///
/// # Errors
///
/// Returns an error if the scraper cannot be built or every app failed.
pub(crate) async fn run_collection(
    settings: ScraperSettings,
    store: Arc<dyn ReviewStore>,
    plan: CollectPlan,
) -> anyhow::Result<CollectionTotals> {
    let tokens = TokenCache::new(TokenProvider::new(&settings)?);
    let client = ReviewClient::new(settings)?;
    let sink = DeduplicatingSink::new(store, plan.batch_size);

    let app_count = plan.apps.len();
    if app_count == 0 {
        return Ok(CollectionTotals::default());
    }
    let max_concurrent = plan.max_concurrent.max(1);
    let max_records = plan.max_records;
    let keyword = plan.keyword.as_deref();

    let results: Vec<(AppRef, AppOutcome)> = stream::iter(plan.apps)
        .map(|app| {
            let (client, tokens, sink) = (&client, &tokens, &sink);
            async move {
                let outcome =
                    collect_app(client, tokens, sink, app.clone(), keyword, max_records).await;
                (app, outcome)
            }
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    let mut totals = CollectionTotals::default();
    for (app, outcome) in results {
        match outcome {
            AppOutcome::Ok { fetched, counts } => {
                totals.fetched += fetched;
                totals.counts += counts;
            }
            AppOutcome::Err {
                error,
                last_cursor,
                fetched,
                counts,
            } => {
                tracing::error!(
                    app = %app,
                    app_id = %app.app_id,
                    last_cursor = last_cursor.as_deref().unwrap_or("-"),
                    fetched,
                    error = %error,
                    "app collection failed"
                );
                totals.fetched += fetched;
                totals.counts += counts;
                totals.failed_apps += 1;
            }
        }
    }

    if totals.failed_apps > 0 {
        tracing::warn!(
            failed_apps = totals.failed_apps,
            total_apps = app_count,
            "some apps failed during collection"
        );
    }

    if totals.failed_apps == app_count {
        anyhow::bail!("all {app_count} apps failed collection");
    }

    Ok(totals)
}

/// Walks one app's pages in order, persisting each page as it arrives.
async fn collect_app(
    client: &ReviewClient,
    tokens: &TokenCache,
    sink: &DeduplicatingSink,
    app: AppRef,
    keyword: Option<&str>,
    max_records: usize,
) -> AppOutcome {
    let mut pager = client.pager(tokens, app).with_max_records(max_records);
    let mut fetched = 0u64;
    let mut counts = BatchCounts::default();

    loop {
        match pager.next_page().await {
            Ok(Some(page)) => {
                fetched += page.reviews.len() as u64;
                let records: Vec<PersistedRecord> = page
                    .reviews
                    .into_iter()
                    .map(|review| PersistedRecord::new(review, keyword.map(str::to_owned)))
                    .collect();
                let page_counts = sink.upsert_batch(records).await;
                tracing::info!(
                    app_id = %pager.app().app_id,
                    cursor = %page.cursor,
                    inserted = page_counts.inserted,
                    skipped = page_counts.skipped,
                    failed = page_counts.failed,
                    "review page persisted"
                );
                counts += page_counts;
            }
            Ok(None) => {
                tracing::info!(
                    app_id = %pager.app().app_id,
                    fetched,
                    inserted = counts.inserted,
                    "app collection complete"
                );
                return AppOutcome::Ok { fetched, counts };
            }
            Err(e) => {
                return AppOutcome::Err {
                    error: e.into(),
                    last_cursor: pager.cursor().map(str::to_owned),
                    fetched,
                    counts,
                };
            }
        }
    }
}
