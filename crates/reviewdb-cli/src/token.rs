//! `token` command: checks that a media API token can be scraped.

use reviewdb_core::{AppConfig, AppRef};
use reviewdb_scraper::{ScraperSettings, TokenProvider};

/// App whose landing page is used when `--app` is not given.
pub(crate) const DEFAULT_TOKEN_APP: &str = "https://apps.apple.com/us/app/facebook/id284882215";

pub(crate) async fn run_token(config: &AppConfig, app: Option<&str>) -> anyhow::Result<()> {
    let app = AppRef::parse(app.unwrap_or(DEFAULT_TOKEN_APP))?;
    let provider = TokenProvider::new(&ScraperSettings::from_app_config(config))?;

    let token = provider.get_token(&app).await?;
    tracing::info!(app = %app, "media API token acquired");
    println!("token for {app}: {}", token.preview());
    Ok(())
}
