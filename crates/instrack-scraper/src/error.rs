use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("profile not found: {username}")]
    ProfileNotFound { username: String },

    #[error(
        "authentication required to fetch posts; save an Instagram session and pass sessionUsername"
    )]
    AuthenticationRequired,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

impl ScraperError {
    /// `true` for failures that abort the whole scrape immediately rather than
    /// counting toward the consecutive-error tolerance.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScraperError::ProfileNotFound { .. } | ScraperError::AuthenticationRequired
        )
    }
}
