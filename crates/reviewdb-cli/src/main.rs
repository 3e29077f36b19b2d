use clap::{Parser, Subcommand};
use reviewdb_db::ReviewStore;
use tracing_subscriber::EnvFilter;

mod collect;
mod token;

use collect::CollectArgs;

#[derive(Debug, Parser)]
#[command(name = "reviewdb-cli")]
#[command(about = "Collect App Store reviews into a deduplicated store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape reviews for one or more apps and persist them
    Collect(CollectArgs),
    /// Acquire a media API token and print a redacted prefix
    Token {
        /// Storefront URL whose landing page is scraped first
        #[arg(long)]
        app: Option<String>,
    },
    /// Create the reviews table in the configured store
    Migrate,
}

/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("reviewdb-cli: use --help to list commands");
        return Ok(());
    };

    let config = reviewdb_core::load_app_config()?;
    init_tracing(&config.log_level);
    tracing::debug!(env = %config.env, store = config.store.name(), "configuration loaded");

    match command {
        Commands::Collect(args) => collect::run_collect(&config, args).await,
        Commands::Token { app } => token::run_token(&config, app.as_deref()).await,
        Commands::Migrate => {
            let store = reviewdb_db::open_store(&config).await?;
            store.ensure_schema().await?;
            println!("reviews table ready in {} store", store.name());
            Ok(())
        }
    }
}
