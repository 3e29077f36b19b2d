//! In-process store for dry runs and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reviewdb_core::PersistedRecord;

use crate::store::ReviewStore;
use crate::DbError;

#[derive(Default)]
struct Inner {
    rows: HashMap<String, PersistedRecord>,
    insert_calls: usize,
}

/// `HashMap` keyed by row hash.
///
/// Enforces the `rating BETWEEN 1 AND 5` check of the SQL schema: an insert
/// containing an out-of-range rating fails as a whole and writes nothing.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn contains(&self, row_hash: &str) -> bool {
        self.lock().rows.contains_key(row_hash)
    }

    /// Number of `insert_or_ignore` calls made so far.
    #[must_use]
    pub fn insert_calls(&self) -> usize {
        self.lock().insert_calls
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_schema(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn insert_or_ignore(&self, records: &[PersistedRecord]) -> Result<u64, DbError> {
        let mut inner = self.lock();
        inner.insert_calls += 1;

        if let Some(bad) = records
            .iter()
            .find(|record| !(1..=5).contains(&record.review.rating))
        {
            return Err(DbError::Constraint {
                row_hash: bad.row_hash.clone(),
                constraint: "rating BETWEEN 1 AND 5",
            });
        }

        let mut inserted = 0u64;
        for record in records {
            if !inner.rows.contains_key(&record.row_hash) {
                inner.rows.insert(record.row_hash.clone(), record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn count(&self) -> Result<u64, DbError> {
        Ok(self.lock().rows.len() as u64)
    }
}
