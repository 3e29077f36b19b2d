//! Idempotent batch ingestion on top of any [`ReviewStore`].

use std::collections::HashSet;
use std::ops::AddAssign;
use std::sync::Arc;

use reviewdb_core::PersistedRecord;

use crate::store::ReviewStore;

/// Rows per insert call.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Outcome of one [`DeduplicatingSink::upsert_batch`] call.
///
/// `inserted + skipped + failed` always equals the number of records submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    /// New rows written.
    pub inserted: u64,
    /// Rows already present, or repeated within the submitted batch.
    pub skipped: u64,
    /// Rows the store refused even when written alone.
    pub failed: u64,
}

impl BatchCounts {
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.inserted + self.skipped + self.failed
    }
}

impl AddAssign for BatchCounts {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Writes reviews so that re-ingesting the same data never duplicates a row.
///
/// Records are de-duplicated by `row_hash` in memory, then written in chunks of
/// `batch_size` through [`ReviewStore::insert_or_ignore`], capped at
/// [`ReviewStore::max_rows_per_call`] so every call is one atomic statement and
/// its inserted count is never lost to a later failure. A chunk the store
/// rejects is split in halves until the offending records are isolated; those
/// are counted as failed and everything else in the chunk is still written.
pub struct DeduplicatingSink {
    store: Arc<dyn ReviewStore>,
    batch_size: usize,
}

impl DeduplicatingSink {
    /// `batch_size` of zero is treated as one.
    #[must_use]
    pub fn new(store: Arc<dyn ReviewStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Inserts `records`, skipping any whose `row_hash` is already stored.
    ///
    /// Never fails as a whole: store errors are logged and reflected in
    /// [`BatchCounts::failed`].
    pub async fn upsert_batch(&self, records: Vec<PersistedRecord>) -> BatchCounts {
        let submitted = records.len() as u64;
        if records.is_empty() {
            return BatchCounts::default();
        }

        let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
        let unique: Vec<PersistedRecord> = records
            .into_iter()
            .filter(|record| seen.insert(record.row_hash.clone()))
            .collect();

        let chunk_size = self.batch_size.min(self.store.max_rows_per_call()).max(1);
        let mut counts = BatchCounts::default();
        for chunk in unique.chunks(chunk_size) {
            counts += self.write_chunk(chunk).await;
        }
        counts.skipped = submitted - counts.inserted - counts.failed;

        tracing::debug!(
            store = self.store.name(),
            submitted,
            inserted = counts.inserted,
            skipped = counts.skipped,
            failed = counts.failed,
            "review batch written"
        );
        counts
    }

    /// Writes one chunk, bisecting on failure. `skipped` is left for the caller
    /// to derive.
    async fn write_chunk(&self, chunk: &[PersistedRecord]) -> BatchCounts {
        let mut counts = BatchCounts::default();
        let mut pending: Vec<&[PersistedRecord]> = vec![chunk];

        while let Some(part) = pending.pop() {
            match self.store.insert_or_ignore(part).await {
                Ok(inserted) => counts.inserted += inserted,
                Err(e) if part.len() == 1 => {
                    tracing::error!(
                        store = self.store.name(),
                        row_hash = %part[0].row_hash,
                        app_id = %part[0].review.app_id,
                        error = %e,
                        "review row could not be written"
                    );
                    counts.failed += 1;
                }
                Err(e) => {
                    let hashes: Vec<&str> = part.iter().map(|r| r.row_hash.as_str()).collect();
                    tracing::warn!(
                        store = self.store.name(),
                        rows = part.len(),
                        row_hashes = ?hashes,
                        error = %e,
                        "review chunk failed; splitting to isolate bad rows"
                    );
                    let (left, right) = part.split_at(part.len() / 2);
                    pending.push(right);
                    pending.push(left);
                }
            }
        }

        counts
    }
}
