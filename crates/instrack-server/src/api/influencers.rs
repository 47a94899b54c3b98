//! Influencer read/delete endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub struct InfluencerItem {
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

#[derive(Debug, Serialize)]
pub struct InfluencerStatsBody {
    pub total_posts: i64,
    pub partnerships: i64,
}

#[derive(Debug, Serialize)]
pub struct InfluencerDetail {
    #[serde(flatten)]
    pub influencer: InfluencerItem,
    pub stats: InfluencerStatsBody,
}

#[derive(Debug, Serialize)]
pub struct DeletedData {
    pub deleted: bool,
}

impl From<instrack_db::InfluencerRow> for InfluencerItem {
    fn from(row: instrack_db::InfluencerRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            bio: row.bio,
            followers: row.followers,
            following: row.following,
            posts_count: row.posts_count,
            profile_pic_url: row.profile_pic_url,
            is_verified: row.is_verified,
            is_business: row.is_business,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// `GET /api/v1/influencers` — all influencers, most-followed first.
pub async fn list_influencers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<InfluencerItem>>>, ApiError> {
    let rows = instrack_db::list_influencers(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(InfluencerItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/influencers/{id}` — one influencer with post totals.
pub async fn get_influencer(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<InfluencerDetail>>, ApiError> {
    let row = instrack_db::get_influencer(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "influencer not found"))?;

    let stats = instrack_db::get_influencer_stats(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: InfluencerDetail {
            influencer: InfluencerItem::from(row),
            stats: InfluencerStatsBody {
                total_posts: stats.total_posts,
                partnerships: stats.partnerships,
            },
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `DELETE /api/v1/influencers/{id}` — removes the influencer; posts and
/// scrape logs cascade.
pub async fn delete_influencer(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedData>>, ApiError> {
    let deleted = instrack_db::delete_influencer(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if !deleted {
        return Err(ApiError::new(req_id.0, "not_found", "influencer not found"));
    }

    Ok(Json(ApiResponse {
        data: DeletedData { deleted: true },
        meta: ResponseMeta::new(req_id.0),
    }))
}
