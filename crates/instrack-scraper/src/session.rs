//! Loading of previously saved Instagram session cookies.
//!
//! Sessions are produced out-of-band (by instaloader's login flow) and stored
//! as a JSON cookie map at `<config dir>/instaloader/session-<username>`,
//! where the config dir is `$XDG_CONFIG_HOME` or `~/.config`. A missing or
//! unreadable file is not an error; the scrape continues anonymously.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Saved session cookies for an authenticated Instagram account.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct SessionData {
    cookies: HashMap<String, String>,
}

impl SessionData {
    /// Renders the cookies as a single `Cookie` header value.
    #[must_use]
    pub fn cookie_header(&self) -> String {
        let mut pairs: Vec<_> = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        // Stable order so requests are reproducible across runs.
        pairs.sort();
        pairs.join("; ")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Path of the session file for `username`.
///
/// `session_dir` overrides the default lookup; otherwise the instaloader
/// convention applies: `$XDG_CONFIG_HOME/instaloader` falling back to
/// `~/.config/instaloader`.
#[must_use]
pub fn session_file_path(session_dir: Option<&Path>, username: &str) -> PathBuf {
    let dir = match session_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_session_dir(),
    };
    dir.join(format!("session-{username}"))
}

fn default_session_dir() -> PathBuf {
    let config_home = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"));
    config_home.join("instaloader")
}

/// Loads the saved session for `username`, or `None` if the file is missing,
/// unreadable, or not valid JSON. Failures are logged, never fatal.
#[must_use]
pub fn load_session(session_dir: Option<&Path>, username: &str) -> Option<SessionData> {
    let path = session_file_path(session_dir, username);

    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read session file");
            return None;
        }
    };

    match serde_json::from_str::<SessionData>(&raw) {
        Ok(session) if !session.is_empty() => Some(session),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "session file contains no cookies");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "session file is not valid JSON");
            None
        }
    }
}
