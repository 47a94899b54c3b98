//! Normalization from raw Instagram types to [`instrack_core::ProfileData`]
//! and [`instrack_core::PostData`].
//!
//! Caption mentions and hashtags are extracted with the same token rules the
//! instagram.com frontend linkifies: `@` / `#` followed by word characters
//! and (for mentions) dots, lowercased. Sponsorship is inferred from the
//! explicit paid-partnership label OR a fixed vocabulary of partnership
//! hashtags.

use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;

use instrack_core::{PostData, ProfileData};

use crate::types::{IgPostNode, IgUser};

/// Hashtags that mark a post as a brand partnership even without the
/// explicit paid-partnership label. Matched case-insensitively.
const PARTNERSHIP_HASHTAGS: [&str; 5] = ["ad", "sponsored", "pub", "partenariat", "collab"];

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Za-z0-9_][A-Za-z0-9_.]*)").expect("mention regex is valid")
});

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("hashtag regex is valid"));

/// Maps a raw profile record to the normalized shape.
#[must_use]
pub fn extract_profile_data(user: &IgUser) -> ProfileData {
    ProfileData {
        username: user.username.clone(),
        full_name: user.full_name.clone().unwrap_or_default(),
        bio: user.biography.clone().filter(|s| !s.is_empty()),
        followers: user.edge_followed_by.as_ref().map(|c| c.count),
        following: user.edge_follow.as_ref().map(|c| c.count),
        posts_count: user
            .edge_owner_to_timeline_media
            .as_ref()
            .and_then(|m| m.count),
        profile_pic_url: user
            .profile_pic_url_hd
            .clone()
            .or_else(|| user.profile_pic_url.clone()),
        is_verified: user.is_verified,
        is_business: user.is_business_account,
    }
}

/// Maps a raw timeline node to the normalized post shape.
///
/// `owner_username` is the handle of the scraped profile; it is removed from
/// `sponsor_users` so an author tagging themselves never counts as a brand.
#[must_use]
pub fn normalize_post(node: &IgPostNode, owner_username: &str) -> PostData {
    let caption = node
        .edge_media_to_caption
        .edges
        .first()
        .map(|e| e.node.text.clone());

    let mentions = caption.as_deref().map(caption_mentions).unwrap_or_default();
    let hashtags = caption.as_deref().map(caption_hashtags).unwrap_or_default();

    let has_partnership_hashtag = hashtags
        .iter()
        .any(|tag| PARTNERSHIP_HASHTAGS.contains(&tag.as_str()));

    let owner = owner_username.to_lowercase();
    let sponsor_users: Vec<String> = mentions.iter().filter(|m| **m != owner).cloned().collect();

    let tagged_users: Vec<String> = node
        .edge_media_to_tagged_user
        .edges
        .iter()
        .filter_map(|e| e.node.user.username.clone())
        .filter(|u| !u.is_empty())
        .collect();

    let coauthors: Vec<String> = node
        .coauthor_producers
        .iter()
        .filter_map(|h| h.username.clone())
        .filter(|u| !u.is_empty())
        .collect();

    PostData {
        shortcode: node.shortcode.clone(),
        url: format!("https://www.instagram.com/p/{}/", node.shortcode),
        caption,
        posted_at: node
            .taken_at_timestamp
            .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        is_video: node.is_video,
        tagged_users,
        caption_mentions: mentions,
        coauthors,
        is_sponsored: node.is_paid_partnership || has_partnership_hashtag,
        sponsor_users,
    }
}

/// Extracts `@mention` handles from a caption, lowercased, first-occurrence
/// order, deduplicated. Trailing dots are not part of a handle.
#[must_use]
pub fn caption_mentions(caption: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in MENTION_RE.captures_iter(caption) {
        let handle = cap[1].trim_end_matches('.').to_lowercase();
        if !handle.is_empty() && !out.contains(&handle) {
            out.push(handle);
        }
    }
    out
}

/// Extracts `#hashtag` tokens from a caption, lowercased, first-occurrence
/// order, deduplicated.
#[must_use]
pub fn caption_hashtags(caption: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in HASHTAG_RE.captures_iter(caption) {
        let tag = cap[1].to_lowercase();
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_caption(shortcode: &str, caption: &str) -> IgPostNode {
        serde_json::from_value(serde_json::json!({
            "shortcode": shortcode,
            "taken_at_timestamp": 1_714_550_400,
            "edge_media_to_caption": {"edges": [{"node": {"text": caption}}]}
        }))
        .expect("node fixture")
    }

    // -----------------------------------------------------------------------
    // caption parsing
    // -----------------------------------------------------------------------

    #[test]
    fn caption_mentions_extracts_and_lowercases() {
        assert_eq!(
            caption_mentions("shoutout to @Alice.B and @bob_c!"),
            vec!["alice.b".to_string(), "bob_c".to_string()]
        );
    }

    #[test]
    fn caption_mentions_strips_sentence_trailing_dot() {
        assert_eq!(caption_mentions("thanks @alice."), vec!["alice".to_string()]);
    }

    #[test]
    fn caption_mentions_deduplicates() {
        assert_eq!(caption_mentions("@a @b @a"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn caption_hashtags_extracts_and_lowercases() {
        assert_eq!(
            caption_hashtags("new drop #Ad #summer2024"),
            vec!["ad".to_string(), "summer2024".to_string()]
        );
    }

    #[test]
    fn empty_caption_yields_no_tokens() {
        assert!(caption_mentions("").is_empty());
        assert!(caption_hashtags("").is_empty());
    }

    // -----------------------------------------------------------------------
    // normalize_post
    // -----------------------------------------------------------------------

    #[test]
    fn normalize_post_builds_url_from_shortcode() {
        let node = node_with_caption("Cxyz123", "hello");
        let post = normalize_post(&node, "alice");
        assert_eq!(post.url, "https://www.instagram.com/p/Cxyz123/");
    }

    #[test]
    fn normalize_post_infers_sponsorship_from_ad_hashtag() {
        let node = node_with_caption("A", "Check this out #ad");
        let post = normalize_post(&node, "alice");
        assert!(post.is_sponsored);
    }

    #[test]
    fn normalize_post_partnership_hashtag_is_case_insensitive() {
        let node = node_with_caption("A", "merci #Partenariat");
        let post = normalize_post(&node, "alice");
        assert!(post.is_sponsored);
    }

    #[test]
    fn normalize_post_not_sponsored_without_signal() {
        let node = node_with_caption("A", "just a sunset #travel");
        let post = normalize_post(&node, "alice");
        assert!(!post.is_sponsored);
    }

    #[test]
    fn normalize_post_explicit_paid_partnership_flag_wins() {
        let node: IgPostNode = serde_json::from_value(serde_json::json!({
            "shortcode": "A",
            "is_paid_partnership": true
        }))
        .expect("node");
        let post = normalize_post(&node, "alice");
        assert!(post.is_sponsored);
    }

    #[test]
    fn normalize_post_sponsor_users_exclude_owner() {
        let node = node_with_caption("A", "with @alice and @brandco #ad");
        let post = normalize_post(&node, "Alice");
        assert_eq!(post.caption_mentions, vec!["alice".to_string(), "brandco".to_string()]);
        assert_eq!(post.sponsor_users, vec!["brandco".to_string()]);
    }

    #[test]
    fn normalize_post_resolves_coauthors_and_drops_null_handles() {
        let node: IgPostNode = serde_json::from_value(serde_json::json!({
            "shortcode": "A",
            "coauthor_producers": [
                {"username": "brandco"},
                {"username": null},
                {"username": ""}
            ]
        }))
        .expect("node");
        let post = normalize_post(&node, "alice");
        assert_eq!(post.coauthors, vec!["brandco".to_string()]);
    }

    #[test]
    fn normalize_post_maps_timestamp_to_utc() {
        let node = node_with_caption("A", "hello");
        let post = normalize_post(&node, "alice");
        let date = post.posted_at.expect("date");
        assert_eq!(date.timestamp(), 1_714_550_400);
    }

    #[test]
    fn normalize_post_missing_timestamp_is_none() {
        let node: IgPostNode = serde_json::from_value(serde_json::json!({"shortcode": "A"}))
            .expect("node");
        let post = normalize_post(&node, "alice");
        assert!(post.posted_at.is_none());
        assert!(post.caption.is_none());
    }

    #[test]
    fn normalize_post_collects_tagged_users() {
        let node: IgPostNode = serde_json::from_value(serde_json::json!({
            "shortcode": "A",
            "edge_media_to_tagged_user": {
                "edges": [
                    {"node": {"user": {"username": "brandco"}}},
                    {"node": {"user": {"username": null}}}
                ]
            }
        }))
        .expect("node");
        let post = normalize_post(&node, "alice");
        assert_eq!(post.tagged_users, vec!["brandco".to_string()]);
    }

    // -----------------------------------------------------------------------
    // extract_profile_data
    // -----------------------------------------------------------------------

    #[test]
    fn extract_profile_data_maps_counts_and_flags() {
        let user: IgUser = serde_json::from_value(serde_json::json!({
            "id": "123",
            "username": "alice",
            "full_name": "Alice B",
            "biography": "travel + food",
            "edge_followed_by": {"count": 1000},
            "edge_follow": {"count": 50},
            "profile_pic_url_hd": "https://cdn.example.com/alice_hd.jpg",
            "profile_pic_url": "https://cdn.example.com/alice.jpg",
            "is_verified": true,
            "is_business_account": false,
            "edge_owner_to_timeline_media": {"count": 321, "edges": []}
        }))
        .expect("user");

        let profile = extract_profile_data(&user);
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.full_name, "Alice B");
        assert_eq!(profile.bio.as_deref(), Some("travel + food"));
        assert_eq!(profile.followers, Some(1000));
        assert_eq!(profile.following, Some(50));
        assert_eq!(profile.posts_count, Some(321));
        assert_eq!(
            profile.profile_pic_url.as_deref(),
            Some("https://cdn.example.com/alice_hd.jpg")
        );
        assert_eq!(profile.is_verified, Some(true));
        assert_eq!(profile.is_business, Some(false));
    }

    #[test]
    fn extract_profile_data_defaults_absent_fields() {
        let user: IgUser =
            serde_json::from_value(serde_json::json!({"id": "123", "username": "alice"}))
                .expect("user");
        let profile = extract_profile_data(&user);
        assert_eq!(profile.full_name, "");
        assert!(profile.bio.is_none());
        assert!(profile.followers.is_none());
        assert!(profile.posts_count.is_none());
        assert!(profile.is_verified.is_none());
    }
}
