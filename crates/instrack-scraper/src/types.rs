//! Instagram web-API response types.
//!
//! ## Observed shapes
//!
//! ### `web_profile_info`
//! `GET /api/v1/users/web_profile_info/?username=<name>` returns
//! `{"data": {"user": {...}}}`. The user object carries counts as nested
//! `{"count": N}` edge objects and embeds the first timeline page under
//! `edge_owner_to_timeline_media`. For unknown usernames the endpoint
//! answers 404, but some frontends have been observed returning 200 with
//! `"user": null` instead; both are treated as not-found.
//!
//! ### Timeline pagination
//! Subsequent pages come from the GraphQL endpoint
//! (`/graphql/query/?query_hash=...&variables=...`) with variables
//! `{"id": <owner id>, "first": 12, "after": <cursor>}`. Anonymous clients
//! past the unauthenticated cap receive `{"data": {"user": null}}`; that
//! shape is classified as an authentication requirement, not an empty feed.
//!
//! ### Pinned posts
//! Timeline nodes carry `pinned_for_users`, an array of user refs that is
//! empty for ordinary posts. There is no boolean flag.
//!
//! ### Captions
//! `edge_media_to_caption.edges` is empty for caption-less posts, otherwise
//! holds a single `{"node": {"text": ...}}` entry.
//!
//! ### Collaborative posts
//! `coauthor_producers` lists the collaborating accounts; entries may have a
//! `null` username for deleted accounts and are dropped during normalization.
//!
//! Every field that has been observed absent on older media is
//! `#[serde(default)]`.

use serde::Deserialize;

/// Top-level envelope of `web_profile_info`.
#[derive(Debug, Deserialize)]
pub struct WebProfileResponse {
    pub data: WebProfileData,
}

#[derive(Debug, Deserialize)]
pub struct WebProfileData {
    #[serde(default)]
    pub user: Option<IgUser>,
}

/// A profile record from `web_profile_info`.
#[derive(Debug, Deserialize)]
pub struct IgUser {
    /// Numeric owner id, serialized as a string. Needed for timeline queries.
    pub id: String,

    pub username: String,

    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub biography: Option<String>,

    #[serde(default)]
    pub edge_followed_by: Option<IgCount>,

    #[serde(default)]
    pub edge_follow: Option<IgCount>,

    /// High-resolution avatar; falls back to `profile_pic_url` when absent.
    #[serde(default)]
    pub profile_pic_url_hd: Option<String>,

    #[serde(default)]
    pub profile_pic_url: Option<String>,

    #[serde(default)]
    pub is_verified: Option<bool>,

    #[serde(default)]
    pub is_business_account: Option<bool>,

    /// First timeline page, embedded in the profile response.
    #[serde(default)]
    pub edge_owner_to_timeline_media: Option<IgTimelineMedia>,
}

/// A nested `{"count": N}` edge-count object.
#[derive(Debug, Deserialize)]
pub struct IgCount {
    pub count: i64,
}

/// One page of a profile's post timeline.
#[derive(Debug, Default, Deserialize)]
pub struct IgTimelineMedia {
    #[serde(default)]
    pub count: Option<i64>,

    #[serde(default)]
    pub page_info: IgPageInfo,

    #[serde(default)]
    pub edges: Vec<IgPostEdge>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IgPageInfo {
    #[serde(default)]
    pub has_next_page: bool,

    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IgPostEdge {
    pub node: IgPostNode,
}

/// A single post node from the timeline.
#[derive(Debug, Deserialize)]
pub struct IgPostNode {
    pub shortcode: String,

    #[serde(default)]
    pub is_video: bool,

    /// Unix timestamp (seconds). Absent on some very old media.
    #[serde(default)]
    pub taken_at_timestamp: Option<i64>,

    /// Non-empty iff the post is pinned to the top of the profile grid.
    #[serde(default)]
    pub pinned_for_users: Vec<IgHandle>,

    /// Explicit paid-partnership label set by the author.
    #[serde(default)]
    pub is_paid_partnership: bool,

    #[serde(default)]
    pub edge_media_to_caption: IgEdges<IgCaptionNode>,

    #[serde(default)]
    pub edge_media_to_tagged_user: IgEdges<IgTaggedUserNode>,

    /// Collaborating accounts on a collaborative post.
    #[serde(default)]
    pub coauthor_producers: Vec<IgHandle>,
}

impl IgPostNode {
    /// Pinned posts sit at the head of the feed regardless of date.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        !self.pinned_for_users.is_empty()
    }
}

/// Generic `{"edges": [{"node": ...}]}` wrapper.
#[derive(Debug, Deserialize)]
pub struct IgEdges<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<IgEdge<T>>,
}

impl<T> Default for IgEdges<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
pub struct IgEdge<T> {
    pub node: T,
}

#[derive(Debug, Deserialize)]
pub struct IgCaptionNode {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct IgTaggedUserNode {
    pub user: IgHandle,
}

/// A bare user reference. Username may be `null` for deleted accounts.
#[derive(Debug, Deserialize)]
pub struct IgHandle {
    #[serde(default)]
    pub username: Option<String>,
}

/// Top-level envelope of a GraphQL timeline page.
#[derive(Debug, Deserialize)]
pub struct TimelineResponse {
    pub data: TimelineData,
}

#[derive(Debug, Deserialize)]
pub struct TimelineData {
    /// `null` when the anonymous post cap has been hit.
    #[serde(default)]
    pub user: Option<TimelineUser>,
}

#[derive(Debug, Deserialize)]
pub struct TimelineUser {
    pub edge_owner_to_timeline_media: IgTimelineMedia,
}
