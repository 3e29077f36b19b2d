use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    /// Network, DNS, TLS, or timeout failure. Fatal for the current app.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// No landing page yielded a bearer token.
    #[error("no media API token for app {app_id} after trying {attempted} page(s)")]
    TokenUnavailable { app_id: String, attempted: usize },

    /// HTTP 429. Consumed by [`crate::RetryPolicy`]; callers only see it when
    /// they bypass the policy.
    #[error("rate limited: {context}")]
    RateLimited { context: String },

    #[error("still rate limited after {attempts} attempt(s): {context}")]
    RateLimitExhausted { context: String, attempts: u32 },

    /// HTTP 401/403: the bearer token was rejected.
    #[error("token rejected with HTTP {status}: {context}")]
    Unauthorized { status: u16, context: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid review payload for {context}: {reason}")]
    InvalidReview { context: String, reason: String },

    /// The server handed back the cursor that was just requested.
    #[error("pagination for app {app_id} stalled at offset {cursor}")]
    CursorCycle { app_id: String, cursor: String },

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
