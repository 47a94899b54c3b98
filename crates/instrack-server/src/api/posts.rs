//! Post read endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, normalize_offset, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub influencer_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PostItem {
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

impl From<instrack_db::PostRow> for PostItem {
    fn from(row: instrack_db::PostRow) -> Self {
        Self {
            id: row.id,
            influencer_id: row.influencer_id,
            shortcode: row.shortcode,
            url: row.url,
            caption: row.caption,
            posted_at: row.posted_at,
            is_video: row.is_video,
            tagged_users: row.tagged_users,
            caption_mentions: row.caption_mentions,
            coauthors: row.coauthors,
            is_sponsored: row.is_sponsored,
            sponsor_users: row.sponsor_users,
            created_at: row.created_at,
        }
    }
}

/// `GET /api/v1/posts` — posts newest-first, optionally filtered by
/// `influencer_id`, paginated with `limit`/`offset`.
pub async fn list_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<ApiResponse<Vec<PostItem>>>, ApiError> {
    let limit = normalize_limit(query.limit);
    let offset = normalize_offset(query.offset);

    let rows = instrack_db::list_posts(&state.pool, query.influencer_id, limit, offset)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(PostItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/posts/{id}` — one post.
pub async fn get_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PostItem>>, ApiError> {
    let row = instrack_db::get_post(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "post not found"))?;

    Ok(Json(ApiResponse {
        data: PostItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}
