pub mod app_config;
pub mod apps;
pub mod config;
pub mod reviews;

pub use app_config::{AppConfig, Environment, StoreBackend};
pub use apps::{load_app_list, parse_app_list, AppRef};
pub use config::{load_app_config, load_app_config_from_env};
pub use reviews::{row_hash, PersistedRecord, Review};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read apps file {path}: {source}")]
    AppsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("apps file line {line}: {source}")]
    AppsFileEntry {
        line: usize,
        #[source]
        source: CoreError,
    },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid App Store URL \"{url}\": {reason}")]
    InvalidAppUrl { url: String, reason: String },

    #[error("rating {0} is outside 1..=5")]
    InvalidRating(i64),
}
