#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Where collected reviews are persisted.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Cloudflare D1 over its HTTP query API.
    D1 {
        account_id: String,
        database_id: String,
        api_token: String,
    },
    /// PostgreSQL through a `sqlx` pool.
    Postgres { database_url: String },
    /// Process-local map; nothing survives the run.
    Memory,
}

impl StoreBackend {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::D1 { .. } => "d1",
            StoreBackend::Postgres { .. } => "postgres",
            StoreBackend::Memory => "memory",
        }
    }
}

impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::D1 {
                account_id,
                database_id,
                ..
            } => f
                .debug_struct("D1")
                .field("account_id", account_id)
                .field("database_id", database_id)
                .field("api_token", &"[redacted]")
                .finish(),
            StoreBackend::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[redacted]")
                .finish(),
            StoreBackend::Memory => write!(f, "Memory"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub store: StoreBackend,
    pub db_max_connections: u32,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agents: Vec<String>,
    pub scraper_max_concurrent_apps: usize,
    pub scraper_page_delay_ms: u64,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_secs: u64,
    pub scraper_max_records: usize,
    pub scraper_locale: String,
    pub sink_batch_size: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("store", &self.store.name())
            .field("db_max_connections", &self.db_max_connections)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agents", &self.scraper_user_agents.len())
            .field(
                "scraper_max_concurrent_apps",
                &self.scraper_max_concurrent_apps,
            )
            .field("scraper_page_delay_ms", &self.scraper_page_delay_ms)
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_secs",
                &self.scraper_retry_backoff_base_secs,
            )
            .field("scraper_max_records", &self.scraper_max_records)
            .field("scraper_locale", &self.scraper_locale)
            .field("sink_batch_size", &self.sink_batch_size)
            .finish()
    }
}
