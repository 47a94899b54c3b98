//! Normalized data shapes produced by the scraper and consumed by persistence.
//!
//! These are the crate-boundary types: the scraper maps raw Instagram
//! responses into them, the server hands them to the database layer. Optional
//! fields are plain `Option`s; absence in the upstream response is carried
//! through rather than defaulted here, and the persistence layer decides the
//! storage defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scraped Instagram profile, keyed by `username`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileData {
    pub username: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub followers: Option<i64>,
    pub following: Option<i64>,
    pub posts_count: Option<i64>,
    pub profile_pic_url: Option<String>,
    pub is_verified: Option<bool>,
    pub is_business: Option<bool>,
}

/// A scraped Instagram post, keyed by `shortcode`.
///
/// The handle sets hold bare usernames without the `@` prefix, lowercased.
/// `sponsor_users` is always a subset of `caption_mentions` with the post
/// owner's own handle removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostData {
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
}
