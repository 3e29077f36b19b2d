use std::sync::Arc;
use std::time::Duration;

use reviewdb_core::{AppConfig, StoreBackend};
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

pub mod d1;
pub mod memory;
pub mod postgres;
pub mod sink;
pub mod store;

pub use d1::D1Store;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use sink::{BatchCounts, DeduplicatingSink, DEFAULT_BATCH_SIZE};
pub use store::ReviewStore;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/reviewdb-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("D1 request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The D1 API answered but reported the statement as failed.
    #[error("D1 query failed: {message}")]
    D1 { message: String },
    /// The row breaks a table constraint the store checks itself.
    #[error("row {row_hash} violates {constraint}")]
    Constraint {
        row_hash: String,
        constraint: &'static str,
    },
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Opens the store selected by `config.store`.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] for a Postgres backend with a blank
/// URL, [`DbError::Sqlx`] if the pool cannot connect, or [`DbError::Http`] if
/// the D1 HTTP client cannot be built.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn ReviewStore>, DbError> {
    match &config.store {
        StoreBackend::D1 {
            account_id,
            database_id,
            api_token,
        } => {
            let store = D1Store::new(account_id, database_id, api_token)?;
            Ok(Arc::new(store))
        }
        StoreBackend::Postgres { database_url } => {
            if database_url.trim().is_empty() {
                return Err(DbError::MissingDatabaseUrl);
            }
            let pool = connect_pool(database_url, PoolConfig::from_app_config(config)).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
