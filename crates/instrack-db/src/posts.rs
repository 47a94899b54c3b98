//! Database operations for the `posts` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use instrack_core::PostData;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub influencer_id: i64,
    pub shortcode: String,
    pub url: String,
    pub caption: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub is_video: bool,
    pub tagged_users: Vec<String>,
    pub caption_mentions: Vec<String>,
    pub coauthors: Vec<String>,
    pub is_sponsored: bool,
    pub sponsor_users: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Inserts a post unless its shortcode is already stored. A post's record is
/// treated as immutable once seen, so a conflict skips the row untouched.
/// Returns whether a row was actually inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_post_if_absent(
    pool: &PgPool,
    influencer_id: i64,
    post: &PostData,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO posts \
             (influencer_id, shortcode, url, caption, posted_at, is_video, \
              tagged_users, caption_mentions, coauthors, is_sponsored, sponsor_users) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (shortcode) DO NOTHING",
    )
    .bind(influencer_id)
    .bind(&post.shortcode)
    .bind(&post.url)
    .bind(&post.caption)
    .bind(post.posted_at)
    .bind(post.is_video)
    .bind(&post.tagged_users)
    .bind(&post.caption_mentions)
    .bind(&post.coauthors)
    .bind(post.is_sponsored)
    .bind(&post.sponsor_users)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns posts newest-first, optionally restricted to one influencer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_posts(
    pool: &PgPool,
    influencer_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostRow>, DbError> {
    let rows = sqlx::query_as::<_, PostRow>(
        "SELECT id, influencer_id, shortcode, url, caption, posted_at, is_video, \
                tagged_users, caption_mentions, coauthors, is_sponsored, sponsor_users, created_at \
         FROM posts \
         WHERE ($1::BIGINT IS NULL OR influencer_id = $1) \
         ORDER BY posted_at DESC NULLS LAST, id DESC \
         LIMIT $2 OFFSET $3",
    )
    .bind(influencer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a single post by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_post(pool: &PgPool, id: i64) -> Result<Option<PostRow>, DbError> {
    let row = sqlx::query_as::<_, PostRow>(
        "SELECT id, influencer_id, shortcode, url, caption, posted_at, is_video, \
                tagged_users, caption_mentions, coauthors, is_sponsored, sponsor_users, created_at \
         FROM posts \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
