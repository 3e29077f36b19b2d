//! Postgres backend for the `app_reviews` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reviewdb_core::PersistedRecord;
use sqlx::PgPool;

use crate::store::ReviewStore;
use crate::DbError;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn ensure_schema(&self) -> Result<(), DbError> {
        crate::run_migrations(&self.pool).await?;
        Ok(())
    }

    /// Inserts the whole batch in one `INSERT … SELECT * FROM UNNEST(…)`
    /// round-trip. `ON CONFLICT DO NOTHING RETURNING` yields only the rows
    /// that were new, so their count is the inserted count.
    async fn insert_or_ignore(&self, records: &[PersistedRecord]) -> Result<u64, DbError> {
        if records.is_empty() {
            return Ok(0);
        }

        // Collect each column into a parallel Vec for UNNEST binding.
        let mut row_hashes: Vec<String> = Vec::with_capacity(records.len());
        let mut app_ids: Vec<String> = Vec::with_capacity(records.len());
        let mut app_names: Vec<String> = Vec::with_capacity(records.len());
        let mut countries: Vec<String> = Vec::with_capacity(records.len());
        let mut keywords: Vec<Option<String>> = Vec::with_capacity(records.len());
        let mut ratings: Vec<i32> = Vec::with_capacity(records.len());
        let mut titles: Vec<Option<String>> = Vec::with_capacity(records.len());
        let mut user_names: Vec<String> = Vec::with_capacity(records.len());
        let mut review_dates: Vec<DateTime<Utc>> = Vec::with_capacity(records.len());
        let mut bodies: Vec<String> = Vec::with_capacity(records.len());
        let mut edited_flags: Vec<bool> = Vec::with_capacity(records.len());
        let mut developer_responses: Vec<Option<String>> = Vec::with_capacity(records.len());
        let mut review_ids: Vec<Option<String>> = Vec::with_capacity(records.len());

        for record in records {
            let review = &record.review;
            row_hashes.push(record.row_hash.clone());
            app_ids.push(review.app_id.clone());
            app_names.push(review.app_name.clone());
            countries.push(review.country.clone());
            keywords.push(record.keyword.clone());
            ratings.push(i32::from(review.rating));
            titles.push(review.title.clone());
            user_names.push(review.reviewer_name.clone());
            review_dates.push(review.date);
            bodies.push(review.body.clone());
            edited_flags.push(review.is_edited);
            developer_responses.push(review.developer_response.clone());
            review_ids.push(review.review_id.clone());
        }

        let inserted: Vec<String> = sqlx::query_scalar::<_, String>(
            "INSERT INTO app_reviews \
                 (row_hash, app_id, app_name, country, keyword, rating, title, user_name, \
                  review_date, body, is_edited, developer_response, review_id) \
             SELECT * FROM UNNEST(\
                  $1::text[], $2::text[], $3::text[], $4::text[], $5::text[], $6::int4[], \
                  $7::text[], $8::text[], $9::timestamptz[], $10::text[], $11::bool[], \
                  $12::text[], $13::text[]) \
             ON CONFLICT (row_hash) DO NOTHING \
             RETURNING row_hash",
        )
        .bind(&row_hashes)
        .bind(&app_ids)
        .bind(&app_names)
        .bind(&countries)
        .bind(&keywords)
        .bind(&ratings)
        .bind(&titles)
        .bind(&user_names)
        .bind(&review_dates)
        .bind(&bodies)
        .bind(&edited_flags)
        .bind(&developer_responses)
        .bind(&review_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(inserted.len() as u64)
    }

    async fn count(&self) -> Result<u64, DbError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_reviews")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}
