//! Scrape history endpoints.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, normalize_offset, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub struct ListScrapeLogsQuery {
    pub influencer_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ScrapeLogItem {
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

impl From<instrack_db::ScrapeLogHistoryRow> for ScrapeLogItem {
    fn from(row: instrack_db::ScrapeLogHistoryRow) -> Self {
        Self {
            id: row.id,
            influencer_id: row.influencer_id,
            scraped_at: row.scraped_at,
            date_from: row.date_from,
            date_to: row.date_to,
            posts_count: row.posts_count,
            status: row.status,
            error_message: row.error_message,
            influencer_username: row.influencer_username,
            influencer_full_name: row.influencer_full_name,
            influencer_profile_pic_url: row.influencer_profile_pic_url,
        }
    }
}

/// `GET /api/v1/scrape-logs` — scrape history newest-first with influencer
/// identity joined in, optionally filtered by `influencer_id`.
pub async fn list_scrape_logs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListScrapeLogsQuery>,
) -> Result<Json<ApiResponse<Vec<ScrapeLogItem>>>, ApiError> {
    let limit = normalize_limit(query.limit);
    let offset = normalize_offset(query.offset);

    let rows = instrack_db::list_scrape_logs(&state.pool, query.influencer_id, limit, offset)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(ScrapeLogItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
