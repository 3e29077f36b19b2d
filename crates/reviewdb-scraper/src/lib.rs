pub mod client;
pub mod error;
pub mod pagination;
pub mod rate_limit;
pub mod settings;
pub mod token;
pub mod types;

pub use client::{PageOutcome, ReviewClient, ReviewPager};
pub use error::ScraperError;
pub use rate_limit::RetryPolicy;
pub use settings::ScraperSettings;
pub use token::{extract_token, Token, TokenCache, TokenProvider};
pub use types::ReviewPage;
