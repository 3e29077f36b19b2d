use crate::app_config::{AppConfig, Environment, StoreBackend};
use crate::ConfigError;

/// Browser user agents rotated across token and review requests when
/// `REVIEWDB_SCRAPER_USER_AGENTS` is unset.
pub const DEFAULT_USER_AGENTS: [&str; 2] = [
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36",
];

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files; useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation live here, decoupled from the real environment so
/// tests can drive it with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let env = parse_environment(&or_default("REVIEWDB_ENV", "development"))?;
    let log_level = or_default("REVIEWDB_LOG_LEVEL", "info");

    let store = match or_default("REVIEWDB_STORE", "d1").as_str() {
        "d1" => StoreBackend::D1 {
            account_id: require("CLOUDFLARE_ACCOUNT_ID")?,
            database_id: require("CLOUDFLARE_D1_DATABASE_ID")?,
            api_token: require("CLOUDFLARE_API_TOKEN")?,
        },
        "postgres" => StoreBackend::Postgres {
            database_url: require("DATABASE_URL")?,
        },
        "memory" => StoreBackend::Memory,
        other => {
            return Err(ConfigError::InvalidEnvVar {
                var: "REVIEWDB_STORE".to_string(),
                reason: format!("expected d1, postgres, or memory; got \"{other}\""),
            })
        }
    };

    let db_max_connections = parse_u32("REVIEWDB_DB_MAX_CONNECTIONS", "5")?;

    let scraper_request_timeout_secs = parse_u64("REVIEWDB_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agents = parse_user_agents(lookup("REVIEWDB_SCRAPER_USER_AGENTS").ok());
    let scraper_max_concurrent_apps = parse_usize("REVIEWDB_SCRAPER_MAX_CONCURRENT_APPS", "3")?;
    let scraper_page_delay_ms = parse_u64("REVIEWDB_SCRAPER_PAGE_DELAY_MS", "500")?;
    let scraper_max_retries = parse_u32("REVIEWDB_SCRAPER_MAX_RETRIES", "5")?;
    let scraper_retry_backoff_base_secs =
        parse_u64("REVIEWDB_SCRAPER_RETRY_BACKOFF_BASE_SECS", "10")?;
    let scraper_max_records = parse_usize("REVIEWDB_SCRAPER_MAX_RECORDS", "100021")?;
    let scraper_locale = or_default("REVIEWDB_SCRAPER_LOCALE", "en-GB");

    let sink_batch_size = parse_usize("REVIEWDB_SINK_BATCH_SIZE", "50")?;
    if sink_batch_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "REVIEWDB_SINK_BATCH_SIZE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        env,
        log_level,
        store,
        db_max_connections,
        scraper_request_timeout_secs,
        scraper_user_agents,
        scraper_max_concurrent_apps,
        scraper_page_delay_ms,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
        scraper_max_records,
        scraper_locale,
        sink_batch_size,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "REVIEWDB_ENV".to_string(),
            reason: format!("expected development, test, or production; got \"{other}\""),
        }),
    }
}

/// Split a `|`-separated user agent list (user agents contain commas).
fn parse_user_agents(raw: Option<String>) -> Vec<String> {
    let agents: Vec<String> = raw
        .as_deref()
        .unwrap_or_default()
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();

    if agents.is_empty() {
        DEFAULT_USER_AGENTS.iter().map(|s| (*s).to_owned()).collect()
    } else {
        agents
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
