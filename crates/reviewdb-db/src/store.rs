//! Storage seam shared by every backend.

use async_trait::async_trait;
use reviewdb_core::PersistedRecord;

use crate::DbError;

/// Column order used by every backend's insert statement.
pub const REVIEW_COLUMNS: [&str; 14] = [
    "row_hash",
    "app_id",
    "app_name",
    "country",
    "keyword",
    "rating",
    "title",
    "user_name",
    "review_date",
    "body",
    "is_edited",
    "developer_response",
    "review_id",
    "fetched_at",
];

/// A table of reviews keyed by `row_hash`.
///
/// Implementations must treat an existing `row_hash` as a silent no-op so that
/// concurrent writers and repeated runs never create duplicates.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Creates the reviews table if it does not exist.
    async fn ensure_schema(&self) -> Result<(), DbError>;

    /// Most records one [`ReviewStore::insert_or_ignore`] call writes as a
    /// single statement. Larger slices may be split into several statements,
    /// and a failure partway through loses the count of rows already written.
    fn max_rows_per_call(&self) -> usize {
        usize::MAX
    }

    /// Inserts `records`, ignoring any whose `row_hash` already exists.
    /// Returns the number of rows actually inserted.
    ///
    /// On failure some rows may already be written when `records` is longer
    /// than [`ReviewStore::max_rows_per_call`]; retrying the same records is
    /// safe because written rows are then ignored.
    async fn insert_or_ignore(&self, records: &[PersistedRecord]) -> Result<u64, DbError>;

    /// Total rows in the table.
    async fn count(&self) -> Result<u64, DbError>;
}
