//! Lazy paginated iteration over a profile's post timeline.

use std::collections::VecDeque;

use crate::client::InstagramClient;
use crate::error::ScraperError;
use crate::types::{IgPostNode, IgUser};

/// Lazy cursor-driven walk over a profile's posts.
///
/// Seeded with the first timeline page embedded in the profile response,
/// then follows `end_cursor` one page-fetch at a time. Items are yielded
/// individually; a page-fetch failure is surfaced as an error item and the
/// cursor is left in place, so the consumer decides whether to keep calling
/// (the same page is re-requested) or give up. The walk is restartable from
/// scratch by constructing a new `PostFeed`, but not resumable mid-way.
pub struct PostFeed<'a> {
    client: &'a InstagramClient,
    user_id: String,
    pending: VecDeque<IgPostNode>,
    end_cursor: Option<String>,
    has_next_page: bool,
}

impl<'a> PostFeed<'a> {
    /// Builds a feed seeded from the profile's embedded first page.
    #[must_use]
    pub fn new(client: &'a InstagramClient, user: &mut IgUser) -> Self {
        let (pending, end_cursor, has_next_page) = match user.edge_owner_to_timeline_media.take() {
            Some(media) => (
                media.edges.into_iter().map(|e| e.node).collect(),
                media.page_info.end_cursor,
                media.page_info.has_next_page,
            ),
            None => (VecDeque::new(), None, false),
        };

        Self {
            client,
            user_id: user.id.clone(),
            pending,
            end_cursor,
            has_next_page,
        }
    }

    /// Yields the next post, fetching further pages on demand.
    ///
    /// Returns `None` once the feed is exhausted. Fetch failures are yielded
    /// as `Some(Err(..))` items rather than terminating the walk.
    pub async fn next(&mut self) -> Option<Result<IgPostNode, ScraperError>> {
        loop {
            if let Some(node) = self.pending.pop_front() {
                return Some(Ok(node));
            }
            if !self.has_next_page {
                return None;
            }

            match self
                .client
                .fetch_timeline_page(&self.user_id, self.end_cursor.as_deref())
                .await
            {
                Ok(media) => {
                    self.pending = media.edges.into_iter().map(|e| e.node).collect();
                    self.end_cursor = media.page_info.end_cursor;
                    self.has_next_page = media.page_info.has_next_page;
                    // An empty page with a next cursor loops straight into the
                    // following fetch.
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }

    /// `true` once no buffered items remain and no further page exists.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty() && !self.has_next_page
    }
}
