//! Database operations for the `influencers` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use instrack_core::ProfileData;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `influencers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InfluencerRow {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub posts_count: i64,
    pub profile_pic_url: Option<String>,
    pub is_verified: bool,
    pub is_business: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate post counts for one influencer.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct InfluencerStats {
    pub total_posts: i64,
    /// Posts with co-authors or a sponsorship signal.
    pub partnerships: i64,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Inserts a profile, or overwrites its mutable attributes if the username
/// already exists. `id`, `username`, and `created_at` are never changed by
/// the conflict path. Absent optional counts/flags are stored as zero/false.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_influencer(
    pool: &PgPool,
    profile: &ProfileData,
) -> Result<InfluencerRow, DbError> {
    let row = sqlx::query_as::<_, InfluencerRow>(
        "INSERT INTO influencers \
             (username, full_name, bio, followers, following, posts_count, \
              profile_pic_url, is_verified, is_business) \
         VALUES ($1, $2, $3, COALESCE($4, 0), COALESCE($5, 0), COALESCE($6, 0), \
                 $7, COALESCE($8, false), COALESCE($9, false)) \
         ON CONFLICT (username) DO UPDATE SET \
             full_name       = EXCLUDED.full_name, \
             bio             = EXCLUDED.bio, \
             followers       = EXCLUDED.followers, \
             following       = EXCLUDED.following, \
             posts_count     = EXCLUDED.posts_count, \
             profile_pic_url = EXCLUDED.profile_pic_url, \
             is_verified     = EXCLUDED.is_verified, \
             is_business     = EXCLUDED.is_business, \
             updated_at      = NOW() \
         RETURNING id, username, full_name, bio, followers, following, posts_count, \
                   profile_pic_url, is_verified, is_business, created_at, updated_at",
    )
    .bind(&profile.username)
    .bind(&profile.full_name)
    .bind(&profile.bio)
    .bind(profile.followers)
    .bind(profile.following)
    .bind(profile.posts_count)
    .bind(&profile.profile_pic_url)
    .bind(profile.is_verified)
    .bind(profile.is_business)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns a single influencer by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_influencer(pool: &PgPool, id: i64) -> Result<Option<InfluencerRow>, DbError> {
    let row = sqlx::query_as::<_, InfluencerRow>(
        "SELECT id, username, full_name, bio, followers, following, posts_count, \
                profile_pic_url, is_verified, is_business, created_at, updated_at \
         FROM influencers \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns a single influencer by username, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_influencer_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<InfluencerRow>, DbError> {
    let row = sqlx::query_as::<_, InfluencerRow>(
        "SELECT id, username, full_name, bio, followers, following, posts_count, \
                profile_pic_url, is_verified, is_business, created_at, updated_at \
         FROM influencers \
         WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns all influencers ordered by follower count, most-followed first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_influencers(pool: &PgPool) -> Result<Vec<InfluencerRow>, DbError> {
    let rows = sqlx::query_as::<_, InfluencerRow>(
        "SELECT id, username, full_name, bio, followers, following, posts_count, \
                profile_pic_url, is_verified, is_business, created_at, updated_at \
         FROM influencers \
         ORDER BY followers DESC, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns post totals for one influencer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_influencer_stats(pool: &PgPool, id: i64) -> Result<InfluencerStats, DbError> {
    let stats = sqlx::query_as::<_, InfluencerStats>(
        "SELECT COUNT(*) AS total_posts, \
                COUNT(*) FILTER (WHERE cardinality(coauthors) > 0 OR is_sponsored) AS partnerships \
         FROM posts \
         WHERE influencer_id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

/// Deletes an influencer; posts and scrape logs cascade. Returns whether a
/// row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_influencer(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM influencers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
