//! Database operations for the `scrape_logs` audit table. Rows are
//! append-only and never updated after insertion.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `scrape_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeLogRow {
    pub id: i64,
    pub influencer_id: i64,
    pub scraped_at: DateTime<Utc>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub posts_count: i32,
    pub status: String,
    pub error_message: Option<String>,
}

/// A scrape-log row joined with the influencer it belongs to, for the
/// history view.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeLogHistoryRow {
    pub id: i64,
    pub influencer_id: i64,
    pub scraped_at: DateTime<Utc>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub posts_count: i32,
    pub status: String,
    pub error_message: Option<String>,
    pub influencer_username: String,
    pub influencer_full_name: String,
    pub influencer_profile_pic_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Appends one audit record for a completed scrape attempt.
///
/// `status` is one of `success`, `partial`, `failed` (enforced by a table
/// CHECK constraint).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn append_scrape_log(
    pool: &PgPool,
    influencer_id: i64,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    posts_count: i32,
    status: &str,
    error_message: Option<&str>,
) -> Result<ScrapeLogRow, DbError> {
    let row = sqlx::query_as::<_, ScrapeLogRow>(
        "INSERT INTO scrape_logs \
             (influencer_id, date_from, date_to, posts_count, status, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, influencer_id, scraped_at, date_from, date_to, \
                   posts_count, status, error_message",
    )
    .bind(influencer_id)
    .bind(date_from)
    .bind(date_to)
    .bind(posts_count)
    .bind(status)
    .bind(error_message)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns scrape history newest-first with influencer identity joined in,
/// optionally restricted to one influencer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scrape_logs(
    pool: &PgPool,
    influencer_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ScrapeLogHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, ScrapeLogHistoryRow>(
        "SELECT l.id, l.influencer_id, l.scraped_at, l.date_from, l.date_to, \
                l.posts_count, l.status, l.error_message, \
                i.username AS influencer_username, \
                i.full_name AS influencer_full_name, \
                i.profile_pic_url AS influencer_profile_pic_url \
         FROM scrape_logs l \
         JOIN influencers i ON i.id = l.influencer_id \
         WHERE ($1::BIGINT IS NULL OR l.influencer_id = $1) \
         ORDER BY l.scraped_at DESC, l.id DESC \
         LIMIT $2 OFFSET $3",
    )
    .bind(influencer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
