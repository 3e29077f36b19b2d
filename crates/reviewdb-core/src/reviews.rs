use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::CoreError;

/// Date rendering used inside the row hash. Existing stores were keyed with
/// this format, so it must not change.
const HASH_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// One user review of an App Store app, normalized for storage.
///
/// The identity of a review is `(app_id, reviewer_name, date)`; the
/// server-side `review_id` is kept for reference only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub app_id: String,
    /// Decoded app slug, e.g. `"facebook"`.
    pub app_name: String,
    pub country: String,
    /// Star rating, always within `1..=5`.
    pub rating: u8,
    pub title: Option<String>,
    /// Review text with line breaks folded into spaces.
    pub body: String,
    pub reviewer_name: String,
    pub date: DateTime<Utc>,
    pub is_edited: bool,
    pub developer_response: Option<String>,
    pub review_id: Option<String>,
}

impl Review {
    /// Validates a raw star rating.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRating`] for values outside `1..=5`.
    pub fn checked_rating(raw: i64) -> Result<u8, CoreError> {
        u8::try_from(raw)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or(CoreError::InvalidRating(raw))
    }

    /// Folds CR/LF into spaces and trims, so a review stays on one line in
    /// exports.
    #[must_use]
    pub fn normalize_body(raw: &str) -> String {
        raw.replace(['\r', '\n'], " ").trim().to_owned()
    }

    /// Stable dedup key for this review. See [`row_hash`].
    #[must_use]
    pub fn row_hash(&self) -> String {
        row_hash(&self.app_id, &self.reviewer_name, &self.date)
    }
}

/// Computes the storage key for a review identity.
///
/// Lowercase hex SHA-256 of `"{app_id}-{reviewer_name}-{date}"` with the
/// date rendered as `%Y-%m-%d-%H-%M-%S` in UTC. Deterministic across runs and
/// processes.
#[must_use]
pub fn row_hash(app_id: &str, reviewer_name: &str, date: &DateTime<Utc>) -> String {
    let input = format!(
        "{app_id}-{reviewer_name}-{}",
        date.format(HASH_DATE_FORMAT)
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// A review plus the derived key that makes ingestion idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub row_hash: String,
    /// Free-form label attached by the caller (e.g. the search keyword that
    /// surfaced the app).
    pub keyword: Option<String>,
    pub review: Review,
}

impl PersistedRecord {
    #[must_use]
    pub fn new(review: Review, keyword: Option<String>) -> Self {
        Self {
            row_hash: review.row_hash(),
            keyword,
            review,
        }
    }
}
