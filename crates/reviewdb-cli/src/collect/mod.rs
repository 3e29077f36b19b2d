//! `collect` command handler.
//!
//! Called from `main` after config is loaded. Per-app failures are logged
//! and skipped rather than propagated so a single bad app does not abort the
//! full run.

mod runner;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use reviewdb_core::{AppConfig, AppRef};
use reviewdb_db::{MemoryStore, ReviewStore};
use reviewdb_scraper::ScraperSettings;

use runner::{run_collection, CollectPlan};

#[derive(Debug, Args)]
pub(crate) struct CollectArgs {
    /// Storefront URL of an app, e.g. https://apps.apple.com/us/app/facebook/id284882215
    #[arg(long = "app", value_name = "URL")]
    pub apps: Vec<String>,

    /// File with one storefront URL per line (`#` starts a comment)
    #[arg(long, value_name = "PATH")]
    pub apps_file: Option<PathBuf>,

    /// Label stored with every review of this run
    #[arg(long)]
    pub keyword: Option<String>,

    /// Per-app ceiling on collected reviews (overrides REVIEWDB_SCRAPER_MAX_RECORDS)
    #[arg(long)]
    pub max_records: Option<usize>,

    /// Scrape without writing to the configured store
    #[arg(long)]
    pub dry_run: bool,
}

/// Resolves `--app` and `--apps-file` into a de-duplicated app list.
///
/// # Errors
///
/// Returns an error if any URL is invalid, the apps file cannot be read, or
/// no app was given at all.
pub(crate) fn resolve_apps(args: &CollectArgs) -> anyhow::Result<Vec<AppRef>> {
    let mut apps: Vec<AppRef> = args
        .apps
        .iter()
        .map(|url| AppRef::parse(url))
        .collect::<Result<_, _>>()?;

    if let Some(path) = &args.apps_file {
        apps.extend(reviewdb_core::load_app_list(path)?);
    }

    let mut seen = std::collections::HashSet::new();
    apps.retain(|app| seen.insert((app.country.clone(), app.app_id.clone())));

    if apps.is_empty() {
        anyhow::bail!("no apps to collect; pass --app URL or --apps-file PATH");
    }
    Ok(apps)
}

/// Collect reviews for every requested app and persist them.
///
/// When `dry_run` is set, reviews are written to an in-memory store so the
/// printed counts still reflect de-duplication, and nothing reaches the
/// configured store.
///
/// # Errors
///
/// Returns an error if the app list is empty or invalid, the store cannot be
/// opened, or every app failed.
pub(crate) async fn run_collect(config: &AppConfig, args: CollectArgs) -> anyhow::Result<()> {
    let apps = resolve_apps(&args)?;

    let store: Arc<dyn ReviewStore> = if args.dry_run {
        tracing::info!("dry run: reviews go to an in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let store = reviewdb_db::open_store(config).await?;
        store.ensure_schema().await?;
        store
    };

    let plan = CollectPlan {
        apps,
        keyword: args.keyword,
        max_records: args.max_records.unwrap_or(config.scraper_max_records),
        max_concurrent: config.scraper_max_concurrent_apps,
        batch_size: config.sink_batch_size,
    };
    let app_count = plan.apps.len();

    let totals = run_collection(ScraperSettings::from_app_config(config), store, plan).await?;

    println!(
        "collected {} reviews from {}/{} apps: {} new, {} already stored, {} failed{}",
        totals.fetched,
        app_count - totals.failed_apps,
        app_count,
        totals.counts.inserted,
        totals.counts.skipped,
        totals.counts.failed,
        if args.dry_run { " (dry run)" } else { "" }
    );
    Ok(())
}

#[cfg(test)]
#[path = "collect_test.rs"]
mod tests;
