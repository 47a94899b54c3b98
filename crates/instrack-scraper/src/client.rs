//! HTTP client for Instagram's public web API.

use std::time::Duration;

use reqwest::Client;

use crate::error::ScraperError;
use crate::session::SessionData;
use crate::types::{IgTimelineMedia, IgUser, TimelineResponse, WebProfileResponse};

/// App id the instagram.com web frontend sends with every API request.
/// Requests without it are answered with a login redirect.
const WEB_APP_ID: &str = "936619743392459";

/// Query hash of the profile-timeline GraphQL query used for pages past the
/// first (the first page is embedded in the `web_profile_info` response).
const TIMELINE_QUERY_HASH: &str = "003056d32c2554def87228bc3fd9668a";

/// Posts requested per timeline page.
const PAGE_SIZE: u32 = 12;

/// HTTP client for Instagram's `web_profile_info` and timeline GraphQL
/// endpoints.
///
/// Maps response statuses to typed errors: 404 → [`ScraperError::ProfileNotFound`],
/// 401/403 → [`ScraperError::AuthenticationRequired`], any other non-2xx →
/// [`ScraperError::UnexpectedStatus`]. A timeline page whose body carries
/// `"user": null` is also classified as authentication-required; the source
/// serves that shape to anonymous clients past the unauthenticated post cap.
pub struct InstagramClient {
    client: Client,
    base_url: String,
    cookie_header: Option<String>,
}

impl InstagramClient {
    /// Creates an `InstagramClient` with configured timeout and `User-Agent`.
    ///
    /// `base_url` is `https://www.instagram.com` in production; tests point it
    /// at a local mock server.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(timeout_secs: u64, user_agent: &str, base_url: &str) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            cookie_header: None,
        })
    }

    /// Attaches saved session cookies to every subsequent request.
    pub fn set_session(&mut self, session: &SessionData) {
        self.cookie_header = Some(session.cookie_header());
    }

    /// Whether session cookies are attached.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.cookie_header.is_some()
    }

    /// Fetches a profile record (including the embedded first timeline page).
    ///
    /// # Errors
    ///
    /// - [`ScraperError::ProfileNotFound`] — 404, or a 200 body with `user: null`.
    /// - [`ScraperError::AuthenticationRequired`] — 401 or 403.
    /// - [`ScraperError::UnexpectedStatus`] — any other non-2xx status.
    /// - [`ScraperError::Http`] — network or TLS failure.
    /// - [`ScraperError::Deserialize`] — response body is not the expected JSON.
    pub async fn fetch_profile(&self, username: &str) -> Result<IgUser, ScraperError> {
        let url = self.build_url(
            "/api/v1/users/web_profile_info/",
            &[("username", username)],
        )?;

        let response = self.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ScraperError::ProfileNotFound {
                username: username.to_owned(),
            });
        }
        Self::check_auth_status(status)?;
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let parsed = serde_json::from_str::<WebProfileResponse>(&body).map_err(|e| {
            ScraperError::Deserialize {
                context: format!("web_profile_info for {username}"),
                source: e,
            }
        })?;

        parsed.data.user.ok_or_else(|| ScraperError::ProfileNotFound {
            username: username.to_owned(),
        })
    }

    /// Fetches one timeline page past the first, addressed by cursor.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::AuthenticationRequired`] — 401/403, or a 200 body
    ///   with `data.user: null` (anonymous post cap).
    /// - [`ScraperError::UnexpectedStatus`] — any other non-2xx status.
    /// - [`ScraperError::Http`] — network or TLS failure.
    /// - [`ScraperError::Deserialize`] — response body is not the expected JSON.
    pub async fn fetch_timeline_page(
        &self,
        user_id: &str,
        after: Option<&str>,
    ) -> Result<IgTimelineMedia, ScraperError> {
        let url = self.timeline_url(user_id, after)?;

        let response = self.get(&url).send().await?;
        let status = response.status();

        Self::check_auth_status(status)?;
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let parsed = serde_json::from_str::<TimelineResponse>(&body).map_err(|e| {
            ScraperError::Deserialize {
                context: format!("timeline page for user {user_id}"),
                source: e,
            }
        })?;

        match parsed.data.user {
            Some(user) => Ok(user.edge_owner_to_timeline_media),
            None => Err(ScraperError::AuthenticationRequired),
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header("x-ig-app-id", WEB_APP_ID)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(cookies) = &self.cookie_header {
            request = request.header(reqwest::header::COOKIE, cookies);
        }

        request
    }

    /// Builds the GraphQL timeline URL for a given owner id and cursor.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidBaseUrl`] if the configured base URL
    /// cannot be parsed.
    fn timeline_url(&self, user_id: &str, after: Option<&str>) -> Result<String, ScraperError> {
        let variables = match after {
            Some(cursor) => {
                format!(r#"{{"id":"{user_id}","first":{PAGE_SIZE},"after":"{cursor}"}}"#)
            }
            None => format!(r#"{{"id":"{user_id}","first":{PAGE_SIZE}}}"#),
        };

        self.build_url(
            "/graphql/query/",
            &[("query_hash", TIMELINE_QUERY_HASH), ("variables", &variables)],
        )
    }

    /// Builds a full URL against the configured base with query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidBaseUrl`] if the configured base URL
    /// cannot be parsed as a URL base.
    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<String, ScraperError> {
        let base = format!("{}{path}", self.base_url);
        let mut url =
            reqwest::Url::parse(&base).map_err(|e| ScraperError::InvalidBaseUrl {
                base_url: self.base_url.clone(),
                reason: e.to_string(),
            })?;

        for (key, value) in params {
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(url.to_string())
    }

    fn check_auth_status(status: reqwest::StatusCode) -> Result<(), ScraperError> {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ScraperError::AuthenticationRequired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> InstagramClient {
        InstagramClient::new(5, "instrack-test/0.1", "https://www.instagram.com")
            .expect("failed to build test client")
    }

    #[test]
    fn timeline_url_without_cursor() {
        let url = test_client().timeline_url("123", None).expect("url");
        assert!(url.starts_with("https://www.instagram.com/graphql/query/?"));
        assert!(url.contains("query_hash=003056d32c2554def87228bc3fd9668a"));
        assert!(url.contains("%22id%22%3A%22123%22"), "url: {url}");
        assert!(!url.contains("after"));
    }

    #[test]
    fn timeline_url_with_cursor() {
        let url = test_client()
            .timeline_url("123", Some("CURSOR_1"))
            .expect("url");
        assert!(url.contains("CURSOR_1"), "url: {url}");
        assert!(url.contains("%22after%22"), "url: {url}");
    }

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let client = InstagramClient::new(5, "instrack-test/0.1", "http://127.0.0.1:9000/")
            .expect("client");
        let url = client.timeline_url("1", None).expect("url");
        assert!(url.starts_with("http://127.0.0.1:9000/graphql/query/?"));
    }

    #[test]
    fn build_url_rejects_invalid_base() {
        let client = InstagramClient::new(5, "instrack-test/0.1", "not-a-url").expect("client");
        let result = client.build_url("/graphql/query/", &[]);
        assert!(
            matches!(result, Err(ScraperError::InvalidBaseUrl { .. })),
            "expected InvalidBaseUrl, got: {result:?}"
        );
    }

    #[test]
    fn check_auth_status_maps_401_and_403() {
        assert!(matches!(
            InstagramClient::check_auth_status(reqwest::StatusCode::UNAUTHORIZED),
            Err(ScraperError::AuthenticationRequired)
        ));
        assert!(matches!(
            InstagramClient::check_auth_status(reqwest::StatusCode::FORBIDDEN),
            Err(ScraperError::AuthenticationRequired)
        ));
        assert!(InstagramClient::check_auth_status(reqwest::StatusCode::OK).is_ok());
    }
}
