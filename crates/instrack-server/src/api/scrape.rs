//! The scrape trigger: runs the orchestrator, persists results, and narrates
//! progress onto the session event bus.

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use instrack_db::DbError;
use instrack_scraper::{scrape_influencer, InstagramClient, ScrapeRequest, ScraperError};

use crate::events::{ScrapeEventData, ScrapeEventKind};
use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequestBody {
    pub username: String,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub session_username: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResponseData {
    pub success: bool,
    pub influencer_id: i64,
    pub posts_scraped: u64,
}

struct ScrapeSummary {
    influencer_id: i64,
    posts_scraped: u64,
}

/// A failure anywhere between the first fetch and the final log append.
enum TriggerError {
    Scraper(ScraperError),
    Db(DbError),
}

impl From<ScraperError> for TriggerError {
    fn from(e: ScraperError) -> Self {
        TriggerError::Scraper(e)
    }
}

impl From<DbError> for TriggerError {
    fn from(e: DbError) -> Self {
        TriggerError::Db(e)
    }
}

impl TriggerError {
    fn code(&self) -> &'static str {
        match self {
            TriggerError::Scraper(ScraperError::ProfileNotFound { .. }) => "not_found",
            TriggerError::Scraper(ScraperError::AuthenticationRequired) => "source_auth_required",
            TriggerError::Scraper(_) => "bad_gateway",
            TriggerError::Db(_) => "internal_error",
        }
    }

    /// Human-readable message, safe for the stream and the response body.
    fn public_message(&self) -> String {
        match self {
            TriggerError::Scraper(e) => e.to_string(),
            TriggerError::Db(e) => {
                tracing::error!(error = %e, "scrape persistence failed");
                "failed to persist scrape results".to_string()
            }
        }
    }
}

/// `POST /api/v1/scrape`
///
/// Body: `{ username, dateFrom?, dateTo?, sessionId, sessionUsername? }`,
/// dates as `YYYY-MM-DD`. Runs the whole scrape within this request and
/// returns once results are persisted. Progress streams to whichever
/// listener holds the `sessionId` stream open; nobody listening is fine,
/// the scrape still completes and persists.
pub async fn trigger_scrape(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ScrapeRequestBody>,
) -> Result<Json<ApiResponse<ScrapeResponseData>>, ApiError> {
    let username = body.username.trim().trim_start_matches('@').to_owned();
    if username.is_empty() {
        return Err(ApiError::new(
            req_id.0.clone(),
            "validation_error",
            "username must not be empty",
        ));
    }
    if body.session_id.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0.clone(),
            "validation_error",
            "sessionId must not be empty",
        ));
    }

    let date_from = match body.date_from.as_deref().map(|raw| parse_date(raw, "dateFrom")) {
        Some(Err(message)) => {
            return Err(ApiError::new(req_id.0.clone(), "validation_error", message))
        }
        Some(Ok(date)) => Some(date),
        None => None,
    };
    let date_to = match body.date_to.as_deref().map(|raw| parse_date(raw, "dateTo")) {
        Some(Err(message)) => {
            return Err(ApiError::new(req_id.0.clone(), "validation_error", message))
        }
        Some(Ok(date)) => Some(date),
        None => None,
    };

    let request = ScrapeRequest {
        username: username.clone(),
        date_from: date_from.map(start_of_day),
        // The upper bound is inclusive of the whole requested day.
        date_to: date_to.map(end_of_day),
        session_username: body
            .session_username
            .clone()
            .filter(|s| !s.trim().is_empty()),
    };

    let session_id = body.session_id.clone();
    state.events.emit(
        &session_id,
        ScrapeEventKind::Start,
        format!("Starting scrape for @{username}..."),
        None,
    );
    state.events.emit(
        &session_id,
        ScrapeEventKind::Progress,
        "Initializing scraper...",
        None,
    );

    match run_scrape(&state, &session_id, &request, date_from, date_to).await {
        Ok(summary) => Ok(Json(ApiResponse {
            data: ScrapeResponseData {
                success: true,
                influencer_id: summary.influencer_id,
                posts_scraped: summary.posts_scraped,
            },
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => {
            let message = e.public_message();
            state.events.emit(
                &session_id,
                ScrapeEventKind::Error,
                format!("Error: {message}"),
                None,
            );
            record_failed_attempt(&state, &username, date_from, date_to, &message).await;
            Err(ApiError::new(req_id.0, e.code(), message))
        }
    }
}

async fn run_scrape(
    state: &AppState,
    session_id: &str,
    request: &ScrapeRequest,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> Result<ScrapeSummary, TriggerError> {
    let config = &state.config;
    let mut client = InstagramClient::new(
        config.scraper_request_timeout_secs,
        &config.scraper_user_agent,
        &config.scraper_base_url,
    )?;

    let events = state.events.clone();
    let narrate_session = session_id.to_owned();
    let outcome = scrape_influencer(&mut client, request, config.session_dir.as_deref(), |msg| {
        events.emit(&narrate_session, ScrapeEventKind::Progress, msg, None);
    })
    .await?;

    let total = outcome.posts.len();
    state.events.emit(
        session_id,
        ScrapeEventKind::Progress,
        format!(
            "Profile retrieved: {} (@{})",
            outcome.profile.full_name, outcome.profile.username
        ),
        Some(ScrapeEventData {
            total_posts: Some(total as u64),
            ..ScrapeEventData::default()
        }),
    );

    state.events.emit(
        session_id,
        ScrapeEventKind::Progress,
        "Saving influencer profile to database...",
        None,
    );
    let influencer = instrack_db::upsert_influencer(&state.pool, &outcome.profile).await?;

    state.events.emit(
        session_id,
        ScrapeEventKind::Progress,
        format!("Saving {total} posts..."),
        None,
    );
    for (index, post) in outcome.posts.iter().enumerate() {
        instrack_db::insert_post_if_absent(&state.pool, influencer.id, post).await?;

        let saved = index + 1;
        if saved % 10 == 0 || saved == total {
            state.events.emit(
                session_id,
                ScrapeEventKind::Progress,
                format!("Saved {saved}/{total} posts"),
                Some(ScrapeEventData {
                    posts_scraped: Some(saved as u64),
                    total_posts: Some(total as u64),
                    ..ScrapeEventData::default()
                }),
            );
        }
    }

    let status = if outcome.truncated { "partial" } else { "success" };
    instrack_db::append_scrape_log(
        &state.pool,
        influencer.id,
        date_from,
        date_to,
        i32::try_from(total).unwrap_or(i32::MAX),
        status,
        None,
    )
    .await?;

    state.events.emit(
        session_id,
        ScrapeEventKind::Success,
        format!("Successfully scraped {total} posts"),
        Some(ScrapeEventData {
            posts_scraped: Some(total as u64),
            ..ScrapeEventData::default()
        }),
    );

    Ok(ScrapeSummary {
        influencer_id: influencer.id,
        posts_scraped: total as u64,
    })
}

/// Appends a `failed` audit row when the target influencer already exists.
/// A never-seen username has no row to attach the log to; the error event
/// and the server log are the only trace of that attempt.
async fn record_failed_attempt(
    state: &AppState,
    username: &str,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    message: &str,
) {
    match instrack_db::get_influencer_by_username(&state.pool, username).await {
        Ok(Some(row)) => {
            if let Err(e) = instrack_db::append_scrape_log(
                &state.pool,
                row.id,
                date_from,
                date_to,
                0,
                "failed",
                Some(message),
            )
            .await
            {
                tracing::error!(error = %e, "failed to append failed-scrape log");
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "failed to look up influencer for failed-scrape log");
        }
    }
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("invalid {field} (expected YYYY-MM-DD): {e}"))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_milli_opt(23, 59, 59, 999)
        .map_or_else(|| date.and_time(NaiveTime::MIN).and_utc(), |t| t.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{test_app, test_state};
    use crate::events::ScrapeEvent;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use sqlx::PgPool;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post_node(shortcode: &str, taken_at: i64) -> Value {
        json!({
            "shortcode": shortcode,
            "is_video": false,
            "taken_at_timestamp": taken_at,
            "edge_media_to_caption": {
                "edges": [{"node": {"text": format!("caption for {shortcode} #ad @brandco")}}]
            }
        })
    }

    fn profile_json(nodes: &[Value], has_next_page: bool, end_cursor: Option<&str>) -> Value {
        let edges: Vec<Value> = nodes.iter().map(|n| json!({"node": n})).collect();
        json!({
            "data": {
                "user": {
                    "id": "4242",
                    "username": "alice",
                    "full_name": "Alice B",
                    "edge_followed_by": {"count": 1000},
                    "edge_follow": {"count": 50},
                    "edge_owner_to_timeline_media": {
                        "count": nodes.len(),
                        "page_info": {"has_next_page": has_next_page, "end_cursor": end_cursor},
                        "edges": edges
                    }
                }
            }
        })
    }

    async fn mount_profile(server: &MockServer, body: &Value) {
        Mock::given(method("GET"))
            .and(path("/api/v1/users/web_profile_info/"))
            .and(query_param("username", "alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn scrape_request(body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/scrape")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).expect("encode body")))
            .expect("request")
    }

    fn drain(sub: &mut crate::events::Subscription) -> Vec<ScrapeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = sub.rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn clean_scrape_persists_and_streams(pool: PgPool) {
        let server = MockServer::start().await;
        let nodes: Vec<Value> = (0..12)
            .map(|i| post_node(&format!("POST{i}"), 1_714_550_400 + i))
            .collect();
        mount_profile(&server, &profile_json(&nodes, false, None)).await;

        let state = test_state(pool.clone(), &server.uri());
        let bus = state.events.clone();
        let mut sub = bus.subscribe("e2e-session");
        let app = test_app(state);

        let response = app
            .oneshot(scrape_request(&json!({
                "username": "alice",
                "sessionId": "e2e-session"
            })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let body_json: Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(body_json["data"]["success"], true);
        assert_eq!(body_json["data"]["postsScraped"], 12);
        let influencer_id = body_json["data"]["influencerId"].as_i64().expect("id");

        // Persisted rows.
        let post_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&pool)
            .await
            .expect("count posts");
        assert_eq!(post_count, 12);
        let stored_influencer: i64 =
            sqlx::query_scalar("SELECT id FROM influencers WHERE username = 'alice'")
                .fetch_one(&pool)
                .await
                .expect("influencer row");
        assert_eq!(stored_influencer, influencer_id);
        let log_status: String = sqlx::query_scalar("SELECT status FROM scrape_logs")
            .fetch_one(&pool)
            .await
            .expect("one log row");
        assert_eq!(log_status, "success");

        // Sponsorship inference survived persistence.
        let sponsored: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE is_sponsored = true")
                .fetch_one(&pool)
                .await
                .expect("sponsored count");
        assert_eq!(sponsored, 12, "#ad captions must be stored as sponsored");

        // Streamed events: one start, batch progress, exactly one terminal success.
        let events = drain(&mut sub);
        let starts = events
            .iter()
            .filter(|e| e.kind == ScrapeEventKind::Start)
            .count();
        assert_eq!(starts, 1);
        let successes: Vec<_> = events
            .iter()
            .filter(|e| e.kind == ScrapeEventKind::Success)
            .collect();
        assert_eq!(successes.len(), 1);
        assert_eq!(
            successes[0].data.as_ref().and_then(|d| d.posts_scraped),
            Some(12)
        );
        assert!(
            !events.iter().any(|e| e.kind == ScrapeEventKind::Error),
            "no error event on the happy path"
        );
        let batch_messages: Vec<&str> = events
            .iter()
            .filter(|e| e.kind == ScrapeEventKind::Progress)
            .filter(|e| e.data.as_ref().is_some_and(|d| d.posts_scraped.is_some()))
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(
            batch_messages,
            vec!["Saved 10/12 posts", "Saved 12/12 posts"],
            "one progress per 10-post batch plus the final one"
        );
        let terminal_index = events
            .iter()
            .position(|e| e.kind == ScrapeEventKind::Success)
            .expect("success present");
        assert_eq!(
            terminal_index,
            events.len() - 1,
            "nothing follows the terminal event"
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn auth_required_feed_streams_error_and_persists_nothing(pool: PgPool) {
        let server = MockServer::start().await;
        mount_profile(&server, &profile_json(&[], true, Some("cur1"))).await;
        Mock::given(method("GET"))
            .and(path("/graphql/query/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(&json!({"data": {"user": null}})),
            )
            .mount(&server)
            .await;

        let state = test_state(pool.clone(), &server.uri());
        let bus = state.events.clone();
        let mut sub = bus.subscribe("auth-session");
        let app = test_app(state);

        let response = app
            .oneshot(scrape_request(&json!({
                "username": "alice",
                "sessionId": "auth-session"
            })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let body_json: Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(body_json["error"]["code"], "source_auth_required");

        let post_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&pool)
            .await
            .expect("count posts");
        assert_eq!(post_count, 0);
        let log_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scrape_logs")
            .fetch_one(&pool)
            .await
            .expect("count logs");
        assert_eq!(log_count, 0, "unknown influencer leaves no failed log row");

        let events = drain(&mut sub);
        let errors = events
            .iter()
            .filter(|e| e.kind == ScrapeEventKind::Error)
            .count();
        assert_eq!(errors, 1, "exactly one terminal error event");
        assert!(!events.iter().any(|e| e.kind == ScrapeEventKind::Success));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn truncated_scrape_logs_partial_status(pool: PgPool) {
        let server = MockServer::start().await;
        let nodes: Vec<Value> = (0..5)
            .map(|i| post_node(&format!("POST{i}"), 1_714_550_400 + i))
            .collect();
        mount_profile(&server, &profile_json(&nodes, true, Some("cur1"))).await;
        // Every further page fails: the three-strike rule ends the feed with
        // what was collected.
        Mock::given(method("GET"))
            .and(path("/graphql/query/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let app = test_app(test_state(pool.clone(), &server.uri()));
        let response = app
            .oneshot(scrape_request(&json!({
                "username": "alice",
                "sessionId": "partial-session"
            })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let body_json: Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(body_json["data"]["postsScraped"], 5);

        let log_status: String = sqlx::query_scalar("SELECT status FROM scrape_logs")
            .fetch_one(&pool)
            .await
            .expect("log row");
        assert_eq!(log_status, "partial");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn failed_scrape_for_known_influencer_appends_failed_log(pool: PgPool) {
        // Seed the influencer from a previous successful scrape.
        sqlx::query(
            "INSERT INTO influencers (username, full_name) VALUES ('alice', 'Alice B')",
        )
        .execute(&pool)
        .await
        .expect("seed influencer");

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/web_profile_info/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let app = test_app(test_state(pool.clone(), &server.uri()));
        let response = app
            .oneshot(scrape_request(&json!({
                "username": "alice",
                "sessionId": "failed-session"
            })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let (status, error_message): (String, Option<String>) = sqlx::query_as(
            "SELECT status, error_message FROM scrape_logs WHERE influencer_id = \
                 (SELECT id FROM influencers WHERE username = 'alice')",
        )
        .fetch_one(&pool)
        .await
        .expect("failed log row");
        assert_eq!(status, "failed");
        assert!(error_message.is_some());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn empty_username_is_rejected(pool: PgPool) {
        let app = test_app(test_state(pool, "http://127.0.0.1:1"));
        let response = app
            .oneshot(scrape_request(&json!({
                "username": "  ",
                "sessionId": "s1"
            })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let body_json: Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(body_json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn malformed_date_is_rejected(pool: PgPool) {
        let app = test_app(test_state(pool, "http://127.0.0.1:1"));
        let response = app
            .oneshot(scrape_request(&json!({
                "username": "alice",
                "sessionId": "s1",
                "dateFrom": "01/02/2024"
            })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn end_of_day_is_inclusive_of_the_whole_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let bound = end_of_day(date);
        assert_eq!(bound.to_rfc3339(), "2024-03-31T23:59:59.999+00:00");
    }

    #[test]
    fn parse_date_accepts_iso_dates_only() {
        assert!(parse_date("2024-03-31", "dateFrom").is_ok());
        assert!(parse_date("31-03-2024", "dateFrom").is_err());
        assert!(parse_date("soon", "dateTo").is_err());
    }
}
