//! Cloudflare D1 backend over the HTTP query API.
//!
//! Every statement is a `POST {base}/accounts/{account}/d1/database/{db}/query`
//! with a JSON body `{ "sql": ..., "params": [...] }`. D1 caps a statement at
//! 100 bound parameters, so a batch is written as several multi-row
//! `INSERT OR IGNORE` statements of at most [`ROWS_PER_STATEMENT`] rows.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reviewdb_core::PersistedRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{ReviewStore, REVIEW_COLUMNS};
use crate::DbError;

pub const DEFAULT_D1_API_BASE: &str = "https://api.cloudflare.com/client/v4";

const D1_MAX_BOUND_PARAMS: usize = 100;

/// Rows per `INSERT` statement that stay under the D1 parameter cap.
pub const ROWS_PER_STATEMENT: usize = D1_MAX_BOUND_PARAMS / REVIEW_COLUMNS.len();

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS app_reviews (\
    row_hash TEXT PRIMARY KEY, \
    app_id TEXT NOT NULL, \
    app_name TEXT NOT NULL, \
    country TEXT NOT NULL, \
    keyword TEXT, \
    rating INTEGER NOT NULL, \
    title TEXT, \
    user_name TEXT NOT NULL, \
    review_date TEXT NOT NULL, \
    body TEXT NOT NULL, \
    is_edited INTEGER NOT NULL DEFAULT 0, \
    developer_response TEXT, \
    review_id TEXT, \
    fetched_at TEXT NOT NULL)";

#[derive(Serialize)]
struct QueryRequest<'a> {
    sql: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    result: Vec<StatementResult>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    meta: StatementMeta,
}

#[derive(Debug, Default, Deserialize)]
struct StatementMeta {
    #[serde(default)]
    changes: u64,
}

/// HTTP client for a single D1 database.
pub struct D1Store {
    client: reqwest::Client,
    query_url: String,
    api_token: String,
}

impl D1Store {
    /// # Errors
    ///
    /// Returns [`DbError::Http`] if the HTTP client cannot be built.
    pub fn new(account_id: &str, database_id: &str, api_token: &str) -> Result<Self, DbError> {
        Self::with_base_url(DEFAULT_D1_API_BASE, account_id, database_id, api_token)
    }

    /// Same as [`D1Store::new`] against a different API root (tests point this
    /// at a mock server).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(
        base: &str,
        account_id: &str,
        database_id: &str,
        api_token: &str,
    ) -> Result<Self, DbError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            query_url: format!(
                "{}/accounts/{account_id}/d1/database/{database_id}/query",
                base.trim_end_matches('/')
            ),
            api_token: api_token.to_owned(),
        })
    }

    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<StatementResult, DbError> {
        let response = self
            .client
            .post(&self.query_url)
            .bearer_auth(&self.api_token)
            .json(&QueryRequest { sql, params })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: QueryResponse = serde_json::from_str(&body).map_err(|e| DbError::D1 {
            message: format!("HTTP {status}, unreadable response body: {e}"),
        })?;

        if !status.is_success() || !parsed.success {
            let message = if parsed.errors.is_empty() {
                format!("HTTP {status} without error details")
            } else {
                parsed
                    .errors
                    .iter()
                    .map(|e| match e.code {
                        Some(code) => format!("{code}: {}", e.message),
                        None => e.message.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(DbError::D1 { message });
        }

        parsed
            .result
            .into_iter()
            .next()
            .ok_or_else(|| DbError::D1 {
                message: "response carried no statement result".to_owned(),
            })
    }
}

/// `INSERT OR IGNORE` with `rows` placeholder groups.
fn insert_sql(rows: usize) -> String {
    let group = format!("({})", vec!["?"; REVIEW_COLUMNS.len()].join(", "));
    let values = vec![group.as_str(); rows].join(", ");
    format!(
        "INSERT OR IGNORE INTO app_reviews ({}) VALUES {values}",
        REVIEW_COLUMNS.join(", ")
    )
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Bound parameters for one record, in [`REVIEW_COLUMNS`] order.
fn record_params(record: &PersistedRecord, fetched_at: &str) -> [Value; 14] {
    let review = &record.review;
    [
        Value::from(record.row_hash.as_str()),
        Value::from(review.app_id.as_str()),
        Value::from(review.app_name.as_str()),
        Value::from(review.country.as_str()),
        record.keyword.as_deref().map_or(Value::Null, Value::from),
        Value::from(review.rating),
        review.title.as_deref().map_or(Value::Null, Value::from),
        Value::from(review.reviewer_name.as_str()),
        Value::from(timestamp(&review.date)),
        Value::from(review.body.as_str()),
        Value::from(i64::from(review.is_edited)),
        review
            .developer_response
            .as_deref()
            .map_or(Value::Null, Value::from),
        review.review_id.as_deref().map_or(Value::Null, Value::from),
        Value::from(fetched_at),
    ]
}

#[async_trait]
impl ReviewStore for D1Store {
    fn name(&self) -> &'static str {
        "d1"
    }

    fn max_rows_per_call(&self) -> usize {
        ROWS_PER_STATEMENT
    }

    async fn ensure_schema(&self) -> Result<(), DbError> {
        self.query(CREATE_TABLE_SQL, Vec::new()).await?;
        Ok(())
    }

    async fn insert_or_ignore(&self, records: &[PersistedRecord]) -> Result<u64, DbError> {
        let fetched_at = timestamp(&Utc::now());
        let mut inserted = 0u64;

        for statement_rows in records.chunks(ROWS_PER_STATEMENT) {
            let params: Vec<Value> = statement_rows
                .iter()
                .flat_map(|record| record_params(record, &fetched_at))
                .collect();
            let result = self.query(&insert_sql(statement_rows.len()), params).await?;
            inserted += result.meta.changes;
        }

        Ok(inserted)
    }

    async fn count(&self) -> Result<u64, DbError> {
        let result = self
            .query("SELECT COUNT(*) AS n FROM app_reviews", Vec::new())
            .await?;
        result
            .results
            .first()
            .and_then(|row| row.get("n"))
            .and_then(Value::as_u64)
            .ok_or_else(|| DbError::D1 {
                message: "COUNT(*) returned no rows".to_owned(),
            })
    }
}
