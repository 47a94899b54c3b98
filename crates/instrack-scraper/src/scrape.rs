//! The scrape orchestrator: profile fetch, filtered feed walk, normalization.

use std::path::Path;

use chrono::{DateTime, Utc};

use instrack_core::{PostData, ProfileData};

use crate::client::InstagramClient;
use crate::error::ScraperError;
use crate::feed::PostFeed;
use crate::normalize::{extract_profile_data, normalize_post};
use crate::session;

/// Hard cap on collected posts per scrape, regardless of remaining feed.
pub const MAX_POSTS: usize = 100;

/// Item-level fetch errors tolerated in a row before the feed is treated as
/// ended. Any successful item resets the count.
const MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// Posts outside the date window tolerated in a row before iteration stops.
/// The feed is assumed roughly chronological, so this many misses in a row
/// means the window has been exited for good. Heuristic, not a guarantee.
const MAX_CONSECUTIVE_OUT_OF_RANGE: u32 = 4;

/// Parameters for one scrape attempt.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    /// Target handle; a leading `@` is tolerated and trimmed.
    pub username: String,
    /// Inclusive lower bound on post dates.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on post dates (already end-of-day normalized by
    /// the caller).
    pub date_to: Option<DateTime<Utc>>,
    /// Account whose saved session to load for authenticated fetches.
    pub session_username: Option<String>,
}

/// Result of a completed scrape attempt.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub profile: ProfileData,
    pub posts: Vec<PostData>,
    /// Set when iteration stopped before the feed was exhausted: the
    /// consecutive-error threshold, the date-window heuristic, or the post
    /// cap with feed content remaining.
    pub truncated: bool,
}

/// Scrapes a profile and its posts, narrating progress through `on_log`.
///
/// Pinned posts are skipped entirely (they are not chronologically
/// representative and would confuse the date-window heuristic) and touch no
/// counters. The scrape performs no writes; persistence is the caller's
/// separate step.
///
/// # Errors
///
/// - [`ScraperError::ProfileNotFound`] — unknown handle; no posts attempted.
/// - [`ScraperError::AuthenticationRequired`] — the feed demands a login;
///   unrecoverable without a saved session.
/// - Any other [`ScraperError`] from the profile fetch. Item-level faults
///   during feed iteration are tolerated up to the consecutive threshold and
///   never surface as an `Err`.
pub async fn scrape_influencer<F>(
    client: &mut InstagramClient,
    request: &ScrapeRequest,
    session_dir: Option<&Path>,
    mut on_log: F,
) -> Result<ScrapeOutcome, ScraperError>
where
    F: FnMut(&str),
{
    let username = request.username.trim_start_matches('@');

    if let Some(session_username) = &request.session_username {
        on_log(&format!("Loading session for {session_username}..."));
        match session::load_session(session_dir, session_username) {
            Some(saved) => client.set_session(&saved),
            None => {
                tracing::warn!(
                    session_username = %session_username,
                    "failed to load session, continuing without auth"
                );
            }
        }
    }

    on_log(&format!("Fetching profile for @{username}..."));
    let mut user = client.fetch_profile(username).await?;
    let profile = extract_profile_data(&user);
    on_log(&format!(
        "Profile retrieved: {} (@{})",
        profile.full_name, profile.username
    ));
    on_log("Fetching posts...");

    let mut feed = PostFeed::new(client, &mut user);
    let mut posts: Vec<PostData> = Vec::new();
    let mut post_number = 0usize;
    let mut consecutive_errors = 0u32;
    let mut consecutive_out_of_range = 0u32;
    let mut skipped_pinned = 0usize;
    let mut truncated = false;

    while let Some(item) = feed.next().await {
        let node = match item {
            Err(e) => {
                if matches!(e, ScraperError::AuthenticationRequired) {
                    tracing::error!(
                        username = %username,
                        "authentication required to fetch posts"
                    );
                    return Err(e);
                }

                consecutive_errors += 1;
                tracing::error!(
                    error = %e,
                    consecutive_errors,
                    "post fetch failed"
                );
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    on_log("Too many consecutive errors, stopping");
                    truncated = true;
                    break;
                }
                continue;
            }
            Ok(node) => node,
        };

        consecutive_errors = 0;
        post_number += 1;

        if node.is_pinned() {
            skipped_pinned += 1;
            on_log(&format!(
                "Skipping pinned post #{post_number}: {}",
                node.shortcode
            ));
            continue;
        }

        let posted_at = node
            .taken_at_timestamp
            .and_then(|ts| DateTime::from_timestamp(ts, 0));
        on_log(&format!(
            "Post #{post_number}: {} ({})",
            node.shortcode,
            posted_at.map_or_else(|| "no date".to_string(), |d| d.to_rfc3339()),
        ));

        // Undated posts pass through the window unfiltered.
        if let (Some(date_to), Some(date)) = (request.date_to, posted_at) {
            if date > date_to {
                consecutive_out_of_range += 1;
                on_log(&format!(
                    "Post is after the date window ({consecutive_out_of_range} consecutive)"
                ));
                if consecutive_out_of_range >= MAX_CONSECUTIVE_OUT_OF_RANGE {
                    on_log("4 consecutive posts outside the date window, stopping");
                    truncated = true;
                    break;
                }
                continue;
            }
        }
        if let (Some(date_from), Some(date)) = (request.date_from, posted_at) {
            if date < date_from {
                consecutive_out_of_range += 1;
                on_log(&format!(
                    "Post is before the date window ({consecutive_out_of_range} consecutive)"
                ));
                if consecutive_out_of_range >= MAX_CONSECUTIVE_OUT_OF_RANGE {
                    on_log("4 consecutive posts outside the date window, stopping");
                    truncated = true;
                    break;
                }
                continue;
            }
        }

        consecutive_out_of_range = 0;
        posts.push(normalize_post(&node, &profile.username));

        if posts.len() >= MAX_POSTS {
            on_log(&format!("Reached the {MAX_POSTS} post limit"));
            truncated = !feed.is_exhausted();
            break;
        }
    }

    if skipped_pinned > 0 {
        on_log(&format!("Skipped {skipped_pinned} pinned post(s)"));
    }
    on_log(&format!("Done, scraped {} posts", posts.len()));

    Ok(ScrapeOutcome {
        profile,
        posts,
        truncated,
    })
}
